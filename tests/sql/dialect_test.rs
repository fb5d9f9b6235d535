//! Dialect differences observable through the public surface.

use std::sync::Arc;

use sqlframe::dtype::{DType, Value};
use sqlframe::frame::{DataFrame, Engine};
use sqlframe::sql::{Dialect, SqlDialect};
use sqlframe::Result;

#[derive(Debug)]
struct StubEngine {
    dialect: Dialect,
}

impl Engine for StubEngine {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn fetch(&self, _sql: &str) -> Result<Vec<Vec<Value>>> {
        Ok(Vec::new())
    }
}

fn frame(dialect: Dialect) -> DataFrame {
    DataFrame::from_table(
        Arc::new(StubEngine { dialect }),
        "t",
        &[("a", DType::Float64)],
    )
    .unwrap()
}

#[test]
fn identifier_quoting_is_ansi_in_both_dialects() {
    for dialect in [Dialect::Postgres, Dialect::DuckDb] {
        assert_eq!(dialect.quote_identifier("city"), "\"city\"");
        assert_eq!(dialect.quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}

#[test]
fn string_escaping_handles_backslashes_before_quotes() {
    // A backslash followed by a quote must not swallow the quote escape.
    assert_eq!(
        Dialect::Postgres.quote_string("a\\'b"),
        "'a\\\\\\'b'"
    );
}

#[test]
fn median_uses_the_postgres_percentile_spelling() {
    let sql = frame(Dialect::Postgres)
        .agg(&["median"])
        .unwrap()
        .view_sql()
        .unwrap();
    assert!(sql.contains("percentile_cont(0.5) within group (order by \"a\")"));
}

#[test]
fn median_uses_the_duckdb_percentile_spelling() {
    let sql = frame(Dialect::DuckDb)
        .agg(&["median"])
        .unwrap()
        .view_sql()
        .unwrap();
    assert!(sql.contains("quantile_cont(\"a\", 0.5)"));
}

#[test]
fn default_dialect_is_postgres() {
    assert_eq!(Dialect::default(), Dialect::Postgres);
}
