//! Per-dtype expression rules: literal construction, casts, operators.
//!
//! One immutable capability table, built once at process start and handed
//! out by reference. Each entry holds the literal-builder function pointer
//! and the cast allow-list for its dtype. Literals always go through an
//! explicit SQL cast: several edge values (NaN, infinities, negative zero,
//! big integers) are not representable or are ambiguous as bare literals.

use once_cell::sync::Lazy;

use crate::dtype::{DType, Value};
use crate::error::{Result, SqlFrameError};
use crate::sql::Expression;

/// Arithmetic operators with dtype-dependent result rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    /// True division: numeric operands are cast to double precision first.
    Div,
    /// Floor division: the left operand is cast to bigint first.
    FloorDiv,
}

impl ArithmeticOp {
    pub fn name(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Mul => "mul",
            ArithmeticOp::Div => "div",
            ArithmeticOp::FloorDiv => "floordiv",
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div | ArithmeticOp::FloorDiv => "/",
        }
    }
}

/// Comparison operators. All comparisons yield `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
        }
    }
}

/// How to combine two typed expressions with an operator.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorRule {
    /// Two-placeholder template for `Expression::construct`.
    pub template: String,
    /// The dtype of the combined expression.
    pub result: DType,
    /// The dialect's date+interval arithmetic yields a timestamp; results
    /// that should be dates are re-cast with a half-day offset before
    /// truncation to replicate host-language date rounding.
    pub cast_result_to_date: bool,
}

impl OperatorRule {
    fn plain(op: ArithmeticOp, result: DType) -> Self {
        Self {
            template: format!("({{}}) {} ({{}})", op.symbol()),
            result,
            cast_result_to_date: false,
        }
    }

    fn date_workaround(op: ArithmeticOp) -> Self {
        Self {
            cast_result_to_date: true,
            ..Self::plain(op, DType::Date)
        }
    }
}

/// Template wrapped around a combined expression when
/// `cast_result_to_date` is set.
pub const DATE_ROUNDING_TEMPLATE: &str = "cast({} + interval '12 hours' as date)";

type LiteralBuilder = fn(&Value) -> Result<Expression>;

/// The per-dtype capability entry.
struct DtypeRule {
    dtype: DType,
    literal: Option<LiteralBuilder>,
    cast_sources: &'static [DType],
    cast_template: &'static str,
}

/// Immutable registry of dtype rules. Built once; no ambient globals.
pub struct DtypeRegistry {
    rules: Vec<DtypeRule>,
}

static STANDARD: Lazy<DtypeRegistry> = Lazy::new(DtypeRegistry::build_standard);

impl DtypeRegistry {
    /// The standard registry covering every supported logical type.
    pub fn standard() -> &'static DtypeRegistry {
        &STANDARD
    }

    fn build_standard() -> DtypeRegistry {
        DtypeRegistry {
            rules: vec![
                DtypeRule {
                    dtype: DType::Int64,
                    literal: Some(int_literal),
                    cast_sources: &[DType::Float64, DType::Bool, DType::String],
                    cast_template: "cast({} as bigint)",
                },
                DtypeRule {
                    dtype: DType::Float64,
                    literal: Some(float_literal),
                    cast_sources: &[DType::Int64, DType::String],
                    cast_template: "cast({} as double precision)",
                },
                DtypeRule {
                    dtype: DType::String,
                    literal: Some(string_literal),
                    cast_sources: &[
                        DType::Int64,
                        DType::Float64,
                        DType::Bool,
                        DType::Timestamp,
                        DType::Date,
                        DType::Time,
                        DType::Timedelta,
                        DType::NumRange,
                    ],
                    cast_template: "cast({} as text)",
                },
                DtypeRule {
                    dtype: DType::Bool,
                    literal: Some(bool_literal),
                    cast_sources: &[DType::String],
                    cast_template: "cast({} as boolean)",
                },
                DtypeRule {
                    dtype: DType::Timestamp,
                    literal: Some(timestamp_literal),
                    cast_sources: &[DType::String, DType::Date],
                    cast_template: "cast({} as timestamp without time zone)",
                },
                DtypeRule {
                    dtype: DType::Date,
                    literal: Some(date_literal),
                    cast_sources: &[DType::String, DType::Timestamp],
                    cast_template: "cast({} as date)",
                },
                DtypeRule {
                    dtype: DType::Time,
                    literal: Some(time_literal),
                    cast_sources: &[DType::String, DType::Timestamp],
                    cast_template: "cast({} as time without time zone)",
                },
                DtypeRule {
                    dtype: DType::Timedelta,
                    literal: Some(timedelta_literal),
                    cast_sources: &[DType::String],
                    cast_template: "cast({} as interval)",
                },
                DtypeRule {
                    dtype: DType::NumRange,
                    literal: None,
                    cast_sources: &[],
                    cast_template: "",
                },
            ],
        }
    }

    fn rule(&self, dtype: DType) -> &DtypeRule {
        // Indices follow the build order in build_standard; the exhaustive
        // match keeps the lookup total, so a new variant cannot compile
        // without an entry here.
        let index = match dtype {
            DType::Int64 => 0,
            DType::Float64 => 1,
            DType::String => 2,
            DType::Bool => 3,
            DType::Timestamp => 4,
            DType::Date => 5,
            DType::Time => 6,
            DType::Timedelta => 7,
            DType::NumRange => 8,
        };
        let rule = &self.rules[index];
        debug_assert_eq!(rule.dtype, dtype);
        rule
    }

    /// Build a literal expression for a supported host value, returning
    /// the value's dtype alongside.
    pub fn value_to_expression(&self, value: &Value) -> Result<(DType, Expression)> {
        let dtype = value.dtype().ok_or_else(|| {
            SqlFrameError::UnsupportedOperation(
                "cannot infer a dtype for a bare null value; use null_expression() \
                 with an explicit dtype"
                    .to_string(),
            )
        })?;
        let rule = self.rule(dtype);
        match rule.literal {
            Some(build) => Ok((dtype, build(value)?)),
            None => Err(SqlFrameError::UnsupportedOperation(format!(
                "dtype {dtype} has no literal rule"
            ))),
        }
    }

    /// A typed null literal.
    pub fn null_expression(&self, dtype: DType) -> Result<Expression> {
        Expression::construct(
            &format!("cast({{}} as {})", dtype.db_type()),
            &[&Expression::raw("NULL")],
        )
    }

    /// Convert an expression of `source` dtype to `target`.
    ///
    /// Self-casts are identity. Converting from a source outside the
    /// target's allow-list fails with a `TypeConversion` error naming
    /// both types.
    pub fn dtype_to_expression(
        &self,
        source: DType,
        target: DType,
        expression: &Expression,
    ) -> Result<Expression> {
        if source == target {
            return Ok(expression.clone());
        }
        let rule = self.rule(target);
        if !rule.cast_sources.contains(&source) {
            return Err(SqlFrameError::TypeConversion {
                from: source,
                to: target,
            });
        }
        Expression::construct(rule.cast_template, &[expression])
    }

    /// The declared mapping table for arithmetic between two dtypes.
    pub fn arithmetic_rule(
        &self,
        op: ArithmeticOp,
        left: DType,
        right: DType,
    ) -> Result<OperatorRule> {
        use ArithmeticOp::*;
        use DType::*;

        let numeric = |d: DType| matches!(d, Int64 | Float64);
        let rule = match (left, op, right) {
            (l, Add | Sub | Mul, r) if numeric(l) && numeric(r) => {
                let result = if l == Float64 || r == Float64 {
                    Float64
                } else {
                    Int64
                };
                Some(OperatorRule::plain(op, result))
            }
            (l, Div, r) if numeric(l) && numeric(r) => Some(OperatorRule {
                template: "cast({} as double precision) / ({})".to_string(),
                result: Float64,
                cast_result_to_date: false,
            }),
            (l, FloorDiv, r) if numeric(l) && numeric(r) => Some(OperatorRule {
                template: "cast({} as bigint) / ({})".to_string(),
                result: Int64,
                cast_result_to_date: false,
            }),

            (String, Add, String) => Some(OperatorRule {
                template: "({}) || ({})".to_string(),
                result: String,
                cast_result_to_date: false,
            }),

            (Timestamp, Add | Sub, Timedelta) => Some(OperatorRule::plain(op, Timestamp)),
            (Timestamp, Sub, Timestamp) => Some(OperatorRule::plain(op, Timedelta)),

            (Date, Add | Sub, Timedelta) => Some(OperatorRule::date_workaround(op)),
            // The dialect does unexpected things for date - date; force the
            // subtraction through timestamps and back to an interval.
            (Date, Sub, Date) => Some(OperatorRule {
                template: "cast(cast({} as timestamp) - ({}) as interval)".to_string(),
                result: Timedelta,
                cast_result_to_date: false,
            }),

            (Timedelta, Add | Sub, Timedelta) => Some(OperatorRule::plain(op, Timedelta)),
            (Timedelta, Add, Timestamp) => Some(OperatorRule::plain(op, Timestamp)),
            (Timedelta, Add, Date) => Some(OperatorRule::date_workaround(op)),
            (Timedelta, Mul | Div, r) if numeric(r) => Some(OperatorRule::plain(op, Timedelta)),

            _ => None,
        };
        rule.ok_or_else(|| SqlFrameError::InvalidOperand {
            operation: op.name().to_string(),
            left,
            right,
        })
    }

    /// The comparison whitelist per dtype family.
    pub fn comparison_rule(
        &self,
        op: ComparisonOp,
        left: DType,
        right: DType,
    ) -> Result<OperatorRule> {
        use DType::*;

        let allowed: &[DType] = match left {
            Int64 | Float64 => &[Int64, Float64],
            String => &[String],
            Bool => &[Bool],
            Timestamp | Date | Time => &[Timestamp, Date, Time, String],
            Timedelta => &[Timedelta, String],
            NumRange => &[],
        };
        if !allowed.contains(&right) {
            return Err(SqlFrameError::InvalidOperand {
                operation: format!("comparator '{}'", op.symbol()),
                left,
                right,
            });
        }
        Ok(OperatorRule {
            template: format!("({{}}) {} ({{}})", op.symbol()),
            result: Bool,
            cast_result_to_date: false,
        })
    }
}

// =============================================================================
// Literal builders
// =============================================================================

fn mismatch(value: &Value, target: DType) -> SqlFrameError {
    SqlFrameError::TypeConversion {
        from: value.dtype().unwrap_or(target),
        to: target,
    }
}

/// A stringified integer is a valid integer or bigint literal depending
/// on its size; always cast so the result is consistently a bigint.
fn int_literal(value: &Value) -> Result<Expression> {
    let Value::Int(v) = value else {
        return Err(mismatch(value, DType::Int64));
    };
    Expression::construct("cast({} as bigint)", &[&Expression::raw(v.to_string())])
}

/// Floats are passed as quoted strings: NaN, the infinities and -0.0 are
/// not expressible (or not round-trippable) as bare numeric literals.
fn float_literal(value: &Value) -> Result<Expression> {
    let Value::Float(v) = value else {
        return Err(mismatch(value, DType::Float64));
    };
    let text = if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if *v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        let mut buffer = ryu::Buffer::new();
        buffer.format(*v).to_string()
    };
    Expression::construct(
        "cast({} as double precision)",
        &[&Expression::string_value(text)],
    )
}

fn string_literal(value: &Value) -> Result<Expression> {
    let Value::String(v) = value else {
        return Err(mismatch(value, DType::String));
    };
    Expression::construct("cast({} as text)", &[&Expression::string_value(v.clone())])
}

fn bool_literal(value: &Value) -> Result<Expression> {
    let Value::Bool(v) = value else {
        return Err(mismatch(value, DType::Bool));
    };
    Expression::construct(
        "cast({} as boolean)",
        &[&Expression::raw(if *v { "true" } else { "false" })],
    )
}

fn timestamp_literal(value: &Value) -> Result<Expression> {
    let Value::Timestamp(v) = value else {
        return Err(mismatch(value, DType::Timestamp));
    };
    Expression::construct(
        "cast({} as timestamp without time zone)",
        &[&Expression::string_value(
            v.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        )],
    )
}

fn date_literal(value: &Value) -> Result<Expression> {
    let Value::Date(v) = value else {
        return Err(mismatch(value, DType::Date));
    };
    Expression::construct(
        "cast({} as date)",
        &[&Expression::string_value(v.format("%Y-%m-%d").to_string())],
    )
}

fn time_literal(value: &Value) -> Result<Expression> {
    let Value::Time(v) = value else {
        return Err(mismatch(value, DType::Time));
    };
    Expression::construct(
        "cast({} as time without time zone)",
        &[&Expression::string_value(
            v.format("%H:%M:%S%.6f").to_string(),
        )],
    )
}

fn timedelta_literal(value: &Value) -> Result<Expression> {
    let Value::Timedelta(v) = value else {
        return Err(mismatch(value, DType::Timedelta));
    };
    let text = match v.num_microseconds() {
        Some(micros) => format!("{micros} microseconds"),
        None => format!("{} seconds", v.num_seconds()),
    };
    Expression::construct("cast({} as interval)", &[&Expression::string_value(text)])
}
