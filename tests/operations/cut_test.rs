//! Equal-width cut: boundary query, edge adjustments, generated CASE.

use std::sync::{Arc, Mutex};

use sqlframe::dtype::{DType, Value};
use sqlframe::frame::{DataFrame, Engine};
use sqlframe::operations::CutOperation;
use sqlframe::sql::Dialect;
use sqlframe::{Result, SqlFrameError};

/// Records every statement and answers the min/max boundary query.
#[derive(Debug)]
struct ScriptedEngine {
    min: f64,
    max: f64,
    statements: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    fn new(min: f64, max: f64) -> Arc<Self> {
        Arc::new(Self {
            min,
            max,
            statements: Mutex::new(Vec::new()),
        })
    }

    fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

impl Engine for ScriptedEngine {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn fetch(&self, sql: &str) -> Result<Vec<Vec<Value>>> {
        self.statements.lock().unwrap().push(sql.to_string());
        Ok(vec![vec![Value::Float(self.min), Value::Float(self.max)]])
    }
}

fn frame(engine: Arc<ScriptedEngine>) -> DataFrame {
    DataFrame::from_table(engine, "t", &[("a", DType::Float64)]).unwrap()
}

#[test]
fn boundary_query_selects_min_and_max_once() {
    let engine = ScriptedEngine::new(0.0, 10.0);
    let df = frame(Arc::clone(&engine));
    CutOperation::new(df.column("a").unwrap().clone(), 2)
        .call()
        .unwrap();
    let statements = engine.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0],
        "select min(\"a\") as \"range_min\", max(\"a\") as \"range_max\" \
         from (select * from \"t\") as \"t\""
    );
}

#[test]
fn result_is_a_single_range_column_of_case_arms() {
    let engine = ScriptedEngine::new(0.0, 10.0);
    let df = frame(Arc::clone(&engine));
    let result = CutOperation::new(df.column("a").unwrap().clone(), 2)
        .call()
        .unwrap();
    assert_eq!(result.column_names(), vec!["a_range"]);
    assert_eq!(result.column("a_range").unwrap().dtype(), DType::NumRange);

    let sql = result.view_sql().unwrap();
    // Right-closed buckets: strict lower bound, inclusive upper bound.
    assert!(sql.contains("case when (\"a\") >"));
    assert!(sql.contains("and (\"a\") <= 5.0 then numrange(cast("));
    assert!(sql.contains("'(]'"));
    assert!(sql.contains(" else null end"));
    // Exactly two arms for two bins.
    assert_eq!(sql.matches(" when ").count(), 2);
}

#[test]
fn left_closed_buckets_flip_the_operators_and_flag() {
    let engine = ScriptedEngine::new(0.0, 10.0);
    let df = frame(Arc::clone(&engine));
    let sql = CutOperation::new(df.column("a").unwrap().clone(), 2)
        .right(false)
        .call()
        .unwrap()
        .view_sql()
        .unwrap();
    assert!(sql.contains("(\"a\") >= 0.0 and (\"a\") < 5.0"));
    assert!(sql.contains("'[)'"));
}

#[test]
fn keeping_the_index_adds_the_source_column() {
    let engine = ScriptedEngine::new(0.0, 10.0);
    let df = frame(Arc::clone(&engine));
    let result = CutOperation::new(df.column("a").unwrap().clone(), 2)
        .ignore_index(false)
        .call()
        .unwrap();
    assert_eq!(result.column_names(), vec!["a", "a_range"]);
}

#[test]
fn empty_bins_arrive_as_union_all_null_rows() {
    let engine = ScriptedEngine::new(0.0, 10.0);
    let df = frame(Arc::clone(&engine));
    let sql = CutOperation::new(df.column("a").unwrap().clone(), 2)
        .include_empty_bins(true)
        .call()
        .unwrap()
        .view_sql()
        .unwrap();
    assert_eq!(sql.matches("union all select").count(), 2);
    assert_eq!(sql.matches("where not exists").count(), 2);
}

#[test]
fn constant_columns_get_a_symmetric_widening() {
    let engine = ScriptedEngine::new(0.0, 0.0);
    let df = frame(Arc::clone(&engine));
    let sql = CutOperation::new(df.column("a").unwrap().clone(), 1)
        .call()
        .unwrap()
        .view_sql()
        .unwrap();
    // An all-zero column still yields a real interval around zero.
    assert!(sql.contains("-0.001"));
    assert!(sql.contains("cast(0.001 as numeric)"));
    assert_eq!(sql.matches(" when ").count(), 1);
}

#[test]
fn grouped_or_aggregated_input_is_rejected() {
    let engine = ScriptedEngine::new(0.0, 10.0);
    let df = frame(Arc::clone(&engine));
    let aggregated = df.column("a").unwrap().sum().unwrap();
    assert!(matches!(
        CutOperation::new(aggregated, 2).call(),
        Err(SqlFrameError::UnsupportedOperation(_))
    ));

    let grouped = df.groupby(&["a"]).unwrap();
    assert!(matches!(
        CutOperation::new(grouped.column("a").unwrap().clone(), 2).call(),
        Err(SqlFrameError::UnsupportedOperation(_))
    ));
}

#[test]
fn non_numeric_input_is_rejected() {
    let engine = ScriptedEngine::new(0.0, 10.0);
    let df =
        DataFrame::from_table(engine as Arc<dyn Engine>, "t", &[("s", DType::String)]).unwrap();
    assert!(matches!(
        CutOperation::new(df.column("s").unwrap().clone(), 2).call(),
        Err(SqlFrameError::UnsupportedOperation(_))
    ));
}
