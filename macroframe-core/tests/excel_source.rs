//! Integration tests for the Excel series source against frozen workbooks.
//!
//! Fixtures:
//! - `bd.xlsx`: legacy layout (two rows above the header, six description
//!   columns), sheet `YEAR`
//! - `exog.xlsx`: current layout (seven description columns), sheets
//!   `YEAR` and `QUARTER`

mod common;

use common::fixture;
use macroframe_core::data::SheetLayout;
use macroframe_core::frame::{column_values, frame_dates, series_columns};
use macroframe_core::{ExcelSource, PrepareStep, RowType, SeriesSource, SheetSelector, SourceError};

#[test]
fn legacy_workbook_loads_as_fact() {
    let mut source =
        ExcelSource::open(fixture("bd.xlsx"), RowType::Fact, ["Inc_x", "CPIAv", "absent"]).unwrap();
    assert_eq!(source.layout(), SheetLayout::Legacy);
    assert!(source.check().unwrap());

    let frame = source.make_frame().unwrap();
    assert_eq!(frame_dates(frame).unwrap(), vec![2015, 2016, 2017, 2018]);
    assert_eq!(series_columns(frame), vec!["Inc_x", "CPIAv"]);
    assert_eq!(
        column_values(frame, "Inc_x").unwrap(),
        vec![Some(50.1), Some(52.3), Some(55.0), None]
    );
    assert_eq!(source.missing_codes().unwrap(), vec!["absent"]);
}

#[test]
fn legacy_descriptions_keep_code_name_unit() {
    let source = ExcelSource::open(fixture("bd.xlsx"), RowType::Fact, ["Unmpl_s"]).unwrap();
    let descriptions = source.describe().unwrap();
    assert_eq!(descriptions.len(), 1);

    let d = &descriptions[0];
    assert_eq!(d.code2, "Unmpl_s");
    assert_eq!(d.code, Some(3));
    assert_eq!(d.name.as_deref(), Some("Безработица"));
    assert_eq!(d.unit.as_deref(), Some("%"));
    assert_eq!(d.source, None);
    assert_eq!(d.kind, None);
}

#[test]
fn current_workbook_loads_for_non_fact_row_types() {
    for row_type in [RowType::ExogR, RowType::ExogP, RowType::Model] {
        let mut source =
            ExcelSource::open(fixture("exog.xlsx"), row_type, ["LevelRate", "Urals"]).unwrap();
        assert_eq!(source.layout(), SheetLayout::Current);
        assert!(source.check().unwrap());

        let frame = source.make_frame().unwrap();
        assert_eq!(frame_dates(frame).unwrap(), vec![2017, 2018, 2019, 2020, 2021]);
        assert_eq!(
            column_values(frame, "LevelRate").unwrap(),
            vec![Some(7.75), Some(7.25), Some(6.25), Some(4.25), Some(8.5)]
        );
    }
}

#[test]
fn current_descriptions_keep_all_columns() {
    let source = ExcelSource::open(fixture("exog.xlsx"), RowType::ExogR, ["Urals"]).unwrap();
    let d = &source.describe().unwrap()[0];
    assert_eq!(d.code, Some(11));
    assert_eq!(d.source.as_deref(), Some("Минэкономразвития"));
    assert_eq!(d.kind.as_deref(), Some("EXOG_R"));
    assert_eq!(d.database.as_deref(), Some("year"));
    assert_eq!(d.unit.as_deref(), Some("$/bbl"));
}

#[test]
fn layout_follows_row_type_not_file() {
    // A legacy workbook read with a non-fact row type is a layout mismatch.
    let mut source = ExcelSource::open(fixture("bd.xlsx"), RowType::ExogR, ["CPIAv"]).unwrap();
    assert!(!source.check().unwrap());
    assert!(matches!(source.make_frame(), Err(SourceError::LayoutMismatch(_))));

    let source = ExcelSource::open(fixture("exog.xlsx"), RowType::Fact, ["CPIAv"]).unwrap();
    assert!(!source.check().unwrap());
}

#[test]
fn sheet_selected_by_index_or_name() {
    let by_index = ExcelSource::with_sheet(
        fixture("exog.xlsx"),
        RowType::ExogR,
        ["LevelRate"],
        SheetSelector::Index(1),
    );
    let by_name = ExcelSource::with_sheet(
        fixture("exog.xlsx"),
        RowType::ExogR,
        ["LevelRate"],
        SheetSelector::Name("QUARTER".into()),
    );

    for source in [by_index, by_name] {
        let mut source = source.unwrap();
        let frame = source.make_frame().unwrap();
        assert_eq!(frame_dates(frame).unwrap(), vec![2021]);
        assert_eq!(column_values(frame, "LevelRate").unwrap(), vec![Some(7.5)]);
    }
}

#[test]
fn missing_sheet_fails_check_and_load() {
    let mut source = ExcelSource::with_sheet(
        fixture("exog.xlsx"),
        RowType::ExogR,
        ["LevelRate"],
        SheetSelector::Name("MONTH".into()),
    )
    .unwrap();
    assert_eq!(source.table(), "MONTH");
    assert!(!source.check().unwrap());
    assert!(matches!(source.make_frame(), Err(SourceError::SheetNotFound(_))));

    let mut source = ExcelSource::with_sheet(
        fixture("exog.xlsx"),
        RowType::ExogR,
        ["LevelRate"],
        SheetSelector::Index(7),
    )
    .unwrap();
    assert!(!source.check().unwrap());
    assert!(matches!(source.make_frame(), Err(SourceError::SheetNotFound(_))));
}

#[test]
fn prepare_steps_apply_to_workbook_frames() {
    let mut source = ExcelSource::open(fixture("bd.xlsx"), RowType::Fact, ["Inc_x"]).unwrap();
    source.set_prepare(vec![PrepareStep::scale(["Inc_x"], 1000.0)]);
    let values = column_values(source.make_frame().unwrap(), "Inc_x").unwrap();
    assert!((values[0].unwrap() - 50_100.0).abs() < 1e-9);
    assert_eq!(values[3], None);
}

#[test]
fn series_coded_date_is_rejected_on_open() {
    assert!(matches!(
        ExcelSource::open(fixture("bd.xlsx"), RowType::Fact, ["CPIAv", "date"]),
        Err(SourceError::InvalidInput(_))
    ));
}

#[test]
fn missing_workbook_fails_at_construction() {
    assert!(matches!(
        ExcelSource::open(fixture("nope.xlsx"), RowType::Fact, ["CPIAv"]),
        Err(SourceError::NotFound { .. })
    ));
}
