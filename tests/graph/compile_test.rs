//! Query-graph compilation: nesting, CTE hoisting, deduplication.

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlframe::dtype::{DType, Value};
use sqlframe::frame::{DataFrame, Engine};
use sqlframe::graph::{compile, Materialization, SqlModel};
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

fn node(name: &str, sql: &str, refs: &[&Arc<SqlModel>], m: Materialization) -> Arc<SqlModel> {
    let references: BTreeMap<String, Arc<SqlModel>> =
        refs.iter().map(|r| (r.refname(), Arc::clone(r))).collect();
    Arc::new(SqlModel::new(name, sql, references, m).unwrap())
}

#[test]
fn three_level_subquery_nesting() {
    let base = Arc::new(SqlModel::table(Dialect::Postgres, "events").unwrap());
    let mid = node(
        "mid",
        &format!("select \"day\" from {{{}}}", base.refname()),
        &[&base],
        Materialization::Subquery,
    );
    let root = node(
        "root",
        &format!("select count(*) from {{{}}}", mid.refname()),
        &[&mid],
        Materialization::Subquery,
    );
    assert_eq!(
        compile(&root, Dialect::Postgres).unwrap(),
        "select count(*) from (select \"day\" from (select * from \"events\"))"
    );
}

#[test]
fn shared_cte_is_hoisted_once_in_dependency_order() {
    let base = node(
        "base",
        "select * from \"events\"",
        &[],
        Materialization::Cte,
    );
    let left = node(
        "left",
        &format!("select * from {{{}}}", base.refname()),
        &[&base],
        Materialization::Cte,
    );
    let root = node(
        "root",
        &format!(
            "select * from {{{}}} union all select * from {{{}}}",
            left.refname(),
            base.refname()
        ),
        &[&left, &base],
        Materialization::Subquery,
    );
    let sql = compile(&root, Dialect::Postgres).unwrap();
    assert!(sql.starts_with("with "));
    // The shared base body appears exactly once.
    assert_eq!(sql.matches("select * from \"events\"").count(), 1);
    // And its CTE clause precedes the clause that depends on it.
    let base_pos = sql.find(&cte_name(&base)).unwrap();
    let left_pos = sql.find(&cte_name(&left)).unwrap();
    assert!(base_pos < left_pos);
}

/// Hoisted CTE names are the display name suffixed with a hash prefix.
fn cte_name(model: &SqlModel) -> String {
    format!("{}_{}", model.name(), &model.hash()[..8])
}

#[test]
fn missing_substitution_is_an_unresolved_reference() {
    let dangling = node(
        "dangling",
        "select * from {referencedeadbeef}",
        &[],
        Materialization::Subquery,
    );
    assert!(matches!(
        compile(&dangling, Dialect::Postgres),
        Err(SqlFrameError::UnresolvedReference(_))
    ));
}

#[test]
fn escaped_braces_pass_through_compilation() {
    let root = node(
        "root",
        "select '{{not a placeholder}}'",
        &[],
        Materialization::Subquery,
    );
    assert_eq!(
        compile(&root, Dialect::Postgres).unwrap(),
        "select '{not a placeholder}'"
    );
}

#[test]
fn frame_pipeline_compiles_to_nested_selects() {
    let df = DataFrame::from_table(
        Arc::new(StubEngine),
        "sales",
        &[("region", DType::String), ("amount", DType::Int64)],
    )
    .unwrap();
    let sql = df
        .groupby(&["region"])
        .unwrap()
        .sum()
        .unwrap()
        .materialize("per_region")
        .unwrap()
        .view_sql()
        .unwrap();
    // Two wrapping levels around the physical table.
    assert!(sql.contains("from (select \"region\" as \"region\""));
    assert!(sql.contains("from (select * from \"sales\")"));
    assert!(sql.contains("group by \"region\""));
}

#[test]
fn identical_frames_produce_identical_hashes() {
    let a = DataFrame::from_table(Arc::new(StubEngine), "t", &[("x", DType::Int64)]).unwrap();
    let b = DataFrame::from_table(Arc::new(StubEngine), "t", &[("x", DType::Int64)]).unwrap();
    assert_eq!(a.base_node().hash(), b.base_node().hash());
    assert_eq!(a.view_sql().unwrap(), b.view_sql().unwrap());
}
