//! Grouping constructs and frame recombination rules.

use std::sync::Arc;

use sqlframe::dtype::{DType, Value};
use sqlframe::frame::{DataFrame, Engine, GroupBy};
use sqlframe::sql::Dialect;
use sqlframe::{Result, SqlFrameError};

#[derive(Debug)]
struct StubEngine;

impl Engine for StubEngine {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn fetch(&self, _sql: &str) -> Result<Vec<Vec<Value>>> {
        Ok(Vec::new())
    }
}

fn frame() -> DataFrame {
    DataFrame::from_table(
        Arc::new(StubEngine),
        "cities",
        &[
            ("municipality", DType::String),
            ("city", DType::String),
            ("inhabitants", DType::Int64),
        ],
    )
    .unwrap()
}

#[test]
fn groupby_moves_keys_to_the_front() {
    let grouped = frame().groupby(&["city"]).unwrap();
    assert_eq!(
        grouped.column_names(),
        vec!["city", "municipality", "inhabitants"]
    );
    assert_eq!(
        grouped.group_by(),
        Some(&GroupBy::Columns(vec!["city".to_string()]))
    );
}

#[test]
fn grouping_list_renders_parenthesized_subgroups() {
    let sql = frame()
        .select(&["municipality", "city", "inhabitants"])
        .unwrap()
        .groupby_list(&[&["municipality"], &["city"]])
        .unwrap()
        .sum()
        .unwrap()
        .view_sql()
        .unwrap();
    assert!(sql.ends_with("group by (\"municipality\"), (\"city\")"));
}

#[test]
fn grouping_sets_include_the_grand_total_set() {
    let sql = frame()
        .groupby_sets(&[&["municipality"], &[]])
        .unwrap()
        .sum()
        .unwrap()
        .view_sql()
        .unwrap();
    assert!(sql.ends_with("group by grouping sets ((\"municipality\"), ())"));
}

#[test]
fn rollup_and_cube_render_with_their_keyword() {
    let rollup = frame()
        .rollup(&["municipality", "city"])
        .unwrap()
        .sum()
        .unwrap()
        .view_sql()
        .unwrap();
    assert!(rollup.ends_with("group by rollup (\"municipality\", \"city\")"));

    let cube = frame()
        .cube(&["municipality", "city"])
        .unwrap()
        .sum()
        .unwrap()
        .view_sql()
        .unwrap();
    assert!(cube.ends_with("group by cube (\"municipality\", \"city\")"));
}

#[test]
fn grouping_requires_existing_keys() {
    assert!(matches!(
        frame().groupby(&["nope"]),
        Err(SqlFrameError::UnknownColumn(_))
    ));
    assert!(matches!(
        frame().cube(&["municipality", "nope"]),
        Err(SqlFrameError::UnknownColumn(_))
    ));
}

#[test]
fn columns_from_differently_grouped_frames_do_not_recombine() {
    let plain = frame();
    let grouped = plain.groupby(&["municipality"]).unwrap();
    let foreign = grouped.column("inhabitants").unwrap().clone();
    assert!(matches!(
        plain.with_series(foreign),
        Err(SqlFrameError::IncompatibleFrame { .. })
    ));
}

#[test]
fn equal_grouping_constructs_do_recombine() {
    let a = frame().groupby(&["municipality"]).unwrap();
    let b = frame().groupby(&["municipality"]).unwrap();
    // Same base node, same construct: series move freely between them.
    let series = b.column("inhabitants").unwrap().clone().sum().unwrap();
    assert!(a.with_series(series).is_ok());
}

#[test]
fn series_from_different_grouping_cannot_be_combined_arithmetically() {
    let plain = frame();
    let grouped = frame().groupby(&["municipality"]).unwrap();
    let err = plain
        .column("inhabitants")
        .unwrap()
        .add(grouped.column("inhabitants").unwrap())
        .unwrap_err();
    assert!(matches!(err, SqlFrameError::IncompatibleFrame { .. }));
}

#[test]
fn grouped_frame_without_aggregates_cannot_compile() {
    let err = frame()
        .groupby(&["municipality"])
        .unwrap()
        .view_sql()
        .unwrap_err();
    assert!(matches!(err, SqlFrameError::UnsupportedOperation(_)));
}

#[test]
fn grouping_set_keys_lead_the_select_list() {
    let sql = frame()
        .groupby_sets(&[&["municipality", "city"], &["municipality"]])
        .unwrap()
        .sum()
        .unwrap()
        .view_sql()
        .unwrap();
    assert!(sql.starts_with(
        "select \"municipality\" as \"municipality\", \"city\" as \"city\", "
    ));
}
