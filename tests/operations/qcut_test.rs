//! Quantile cut: boundary query, duplicate handling, generated CASE.

use std::sync::{Arc, Mutex};

use sqlframe::dtype::{DType, Value};
use sqlframe::frame::{DataFrame, Engine};
use sqlframe::operations::{QCutOperation, QuantileSpec};
use sqlframe::sql::Dialect;
use sqlframe::{Result, SqlFrameError};

/// Records every statement and answers the quantile boundary query.
#[derive(Debug)]
struct ScriptedEngine {
    boundaries: Vec<f64>,
    statements: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    fn new(boundaries: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            boundaries: boundaries.to_vec(),
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
        Ok(vec![self.boundaries.iter().map(|b| Value::Float(*b)).collect()])
    }
}

fn frame(engine: Arc<ScriptedEngine>) -> DataFrame {
    DataFrame::from_table(engine, "t", &[("a", DType::Float64)]).unwrap()
}

#[test]
fn boundary_query_computes_every_fraction_at_once() {
    let engine = ScriptedEngine::new(&[1.0, 3.0, 5.0]);
    let df = frame(Arc::clone(&engine));
    QCutOperation::new(df.column("a").unwrap().clone(), 2)
        .call()
        .unwrap();
    let statements = engine.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0],
        "select percentile_cont(0.0) within group (order by \"a\") as \"q0\", \
         percentile_cont(0.5) within group (order by \"a\") as \"q1\", \
         percentile_cont(1.0) within group (order by \"a\") as \"q2\" \
         from (select * from \"t\") as \"t\""
    );
}

#[test]
fn first_bucket_is_closed_on_both_sides() {
    let engine = ScriptedEngine::new(&[1.0, 3.0, 5.0]);
    let df = frame(Arc::clone(&engine));
    let sql = QCutOperation::new(df.column("a").unwrap().clone(), 2)
        .call()
        .unwrap()
        .view_sql()
        .unwrap();
    // The minimum itself must land in the first bucket.
    assert!(sql.contains("(\"a\") >= 1.0 and (\"a\") <= 3.0"));
    assert!(sql.contains("'[]'"));
    // Later buckets are left-open.
    assert!(sql.contains("(\"a\") > 3.0 and (\"a\") <= 5.0"));
    assert!(sql.contains("'(]'"));
}

#[test]
fn duplicate_boundaries_are_dropped() {
    let engine = ScriptedEngine::new(&[2.0, 2.0, 2.0, 7.0, 9.0]);
    let df = frame(Arc::clone(&engine));
    let sql = QCutOperation::new(df.column("a").unwrap().clone(), 4)
        .call()
        .unwrap()
        .view_sql()
        .unwrap();
    // Five requested boundaries collapse to three, so two buckets remain.
    assert_eq!(sql.matches(" when ").count(), 2);
}

#[test]
fn explicit_fractions_are_used_verbatim() {
    let engine = ScriptedEngine::new(&[3.0, 5.0]);
    let df = frame(Arc::clone(&engine));
    QCutOperation::new(
        df.column("a").unwrap().clone(),
        QuantileSpec::Fractions(vec![0.25, 0.75]),
    )
    .call()
    .unwrap();
    let statements = engine.statements();
    assert!(statements[0].contains("percentile_cont(0.25)"));
    assert!(statements[0].contains("percentile_cont(0.75)"));
}

#[test]
fn misordered_or_out_of_range_fractions_are_rejected() {
    let engine = ScriptedEngine::new(&[]);
    let df = frame(Arc::clone(&engine));
    for fractions in [vec![0.75, 0.25], vec![-0.1, 0.5], vec![0.5, 1.5]] {
        let result = QCutOperation::new(df.column("a").unwrap().clone(), fractions).call();
        assert!(matches!(
            result,
            Err(SqlFrameError::UnsupportedOperation(_))
        ));
    }
}

#[test]
fn a_single_fraction_classifies_everything_to_null() {
    let engine = ScriptedEngine::new(&[]);
    let df = frame(Arc::clone(&engine));
    let result = QCutOperation::new(
        df.column("a").unwrap().clone(),
        QuantileSpec::Fractions(vec![0.5]),
    )
    .call()
    .unwrap();
    // No boundary query is needed for a degenerate bucket set.
    assert!(engine.statements().is_empty());
    let sql = result.view_sql().unwrap();
    assert!(sql.contains("cast(NULL as numrange) as \"a_range\""));
}

#[test]
fn result_column_is_named_after_the_source() {
    let engine = ScriptedEngine::new(&[1.0, 5.0]);
    let df = frame(Arc::clone(&engine));
    let result = QCutOperation::new(df.column("a").unwrap().clone(), 1)
        .call()
        .unwrap();
    assert_eq!(result.column_names(), vec!["a_range"]);
    assert_eq!(result.column("a_range").unwrap().dtype(), DType::NumRange);
}

#[test]
fn aggregated_input_is_rejected() {
    let engine = ScriptedEngine::new(&[1.0, 5.0]);
    let df = frame(Arc::clone(&engine));
    let aggregated = df.column("a").unwrap().sum().unwrap();
    assert!(matches!(
        QCutOperation::new(aggregated, 2).call(),
        Err(SqlFrameError::UnsupportedOperation(_))
    ));
}
