//! sqlframe - a lazy dataframe core that compiles to SQL.
//!
//! Pandas-style column operations are collected into token-based
//! expressions over an immutable query graph and compiled into one
//! composable `select` statement per frame. No data is held host-side;
//! the only I/O happens at explicit materialization points, through the
//! [`frame::Engine`] collaborator.
//!
//! The layers, bottom up:
//!
//! - [`sql`] - the token vocabulary, the `Expression` composite and the
//!   dialect rules for quoting and percentile spelling
//! - [`graph`] - hash-identified query nodes and their compilation into
//!   a single statement with subqueries and deduplicated CTEs
//! - [`dtype`] - the closed set of logical types, literal rules, cast
//!   allow-lists and operator tables
//! - [`frame`] - `Series` and `DataFrame`, grouping constructs and the
//!   aggregation state machine
//! - [`operations`] - cut/qcut bucketing built on all of the above

pub mod dtype;
pub mod error;
pub mod frame;
pub mod graph;
pub mod operations;
pub mod sql;

pub use error::{Result, SqlFrameError};

/// Commonly used types.
pub mod prelude {
    pub use crate::dtype::{ArithmeticOp, ComparisonOp, DType, NumRange, Value};
    pub use crate::error::{Result, SqlFrameError};
    pub use crate::frame::{DataFrame, Engine, GroupBy, Series};
    pub use crate::graph::{Materialization, SqlModel};
    pub use crate::operations::{CutOperation, QCutOperation, QuantileSpec};
    pub use crate::sql::{Dialect, Expression, SqlDialect};
}
