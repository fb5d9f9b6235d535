//! Logical dtypes and the host values they accept.
//!
//! The dtype set is closed: a fixed list of logical types, each with an
//! explicit literal rule and cast allow-list (see [`rules`]). No type
//! inference happens beyond this set.

pub mod rules;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;

pub use rules::{ArithmeticOp, ComparisonOp, DtypeRegistry, OperatorRule};

/// A logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DType {
    Int64,
    Float64,
    String,
    Bool,
    Timestamp,
    Date,
    Time,
    Timedelta,
    /// Numeric interval with per-side inclusivity, produced by cut/qcut.
    /// Has no literal or cast rules of its own.
    NumRange,
}

impl DType {
    pub fn name(&self) -> &'static str {
        match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::String => "string",
            DType::Bool => "bool",
            DType::Timestamp => "timestamp",
            DType::Date => "date",
            DType::Time => "time",
            DType::Timedelta => "timedelta",
            DType::NumRange => "numrange",
        }
    }

    /// The database-level type this dtype maps to.
    pub fn db_type(&self) -> &'static str {
        match self {
            DType::Int64 => "bigint",
            DType::Float64 => "double precision",
            DType::String => "text",
            DType::Bool => "boolean",
            DType::Timestamp => "timestamp without time zone",
            DType::Date => "date",
            DType::Time => "time without time zone",
            DType::Timedelta => "interval",
            DType::NumRange => "numrange",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A numeric interval with explicit bounds and per-side inclusivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumRange {
    pub lower: f64,
    pub upper: f64,
    pub lower_inc: bool,
    pub upper_inc: bool,
}

impl NumRange {
    pub fn new(lower: f64, upper: f64, lower_inc: bool, upper_inc: bool) -> Self {
        Self {
            lower,
            upper,
            lower_inc,
            upper_inc,
        }
    }

    /// The range-bounds flag as the database spells it: `[`/`(` per side.
    pub fn bounds_flag(&self) -> String {
        format!(
            "{}{}",
            if self.lower_inc { '[' } else { '(' },
            if self.upper_inc { ']' } else { ')' },
        )
    }
}

impl std::fmt::Display for NumRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut lower = ryu::Buffer::new();
        let mut upper = ryu::Buffer::new();
        write!(
            f,
            "{}{}, {}{}",
            if self.lower_inc { '[' } else { '(' },
            lower.format(self.lower),
            upper.format(self.upper),
            if self.upper_inc { ']' } else { ')' },
        )
    }
}

/// A host-language scalar accepted by the literal rules, or returned by
/// the engine when fetching rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Timedelta(TimeDelta),
    NumRange(NumRange),
    Null,
}

impl Value {
    /// The logical dtype this value belongs to, if any. `Null` carries no
    /// dtype of its own.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Value::Int(_) => Some(DType::Int64),
            Value::Float(_) => Some(DType::Float64),
            Value::String(_) => Some(DType::String),
            Value::Bool(_) => Some(DType::Bool),
            Value::Timestamp(_) => Some(DType::Timestamp),
            Value::Date(_) => Some(DType::Date),
            Value::Time(_) => Some(DType::Time),
            Value::Timedelta(_) => Some(DType::Timedelta),
            Value::NumRange(_) => Some(DType::NumRange),
            Value::Null => None,
        }
    }

    /// Convenience accessor for numeric values, widening ints.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}
