//! Bucketing operations: value-range cut and quantile-based qcut.
//!
//! Both run one boundary query through the engine, compute bucket edges
//! host-side, and emit a `case` expression classifying each row into a
//! numeric-range literal. The shared pieces live here: the range literal
//! spelling and the classification `case` builder.

pub mod cut;
pub mod qcut;

pub use cut::CutOperation;
pub use qcut::{QCutOperation, QuantileSpec};

use crate::dtype::{DType, DtypeRegistry, NumRange};
use crate::error::Result;
use crate::frame::Series;
use crate::sql::token::ExpressionToken;
use crate::sql::{AsExpression, Expression};

/// Render a float for direct use in SQL text.
pub(crate) fn float_sql(value: f64) -> String {
    let mut buffer = ryu::Buffer::new();
    buffer.format(value).to_string()
}

/// The `numrange` constructor literal for one bucket.
pub(crate) fn range_literal(range: &NumRange) -> String {
    format!(
        "numrange(cast({} as numeric), cast({} as numeric), '{}')",
        float_sql(range.lower),
        float_sql(range.upper),
        range.bounds_flag(),
    )
}

/// The membership condition for one bucket, with `{}` placeholders for
/// the classified column.
pub(crate) fn range_condition(range: &NumRange) -> String {
    format!(
        "({{}}) {} {} and ({{}}) {} {}",
        if range.lower_inc { ">=" } else { ">" },
        float_sql(range.lower),
        if range.upper_inc { "<=" } else { "<" },
        float_sql(range.upper),
    )
}

/// Build the `case` expression classifying `series` into `ranges`.
///
/// Rows outside every bucket fall through to null. With no buckets at all
/// the whole expression collapses to a typed null.
pub(crate) fn classification_case(series: &Series, ranges: &[NumRange]) -> Result<Expression> {
    if ranges.is_empty() {
        return DtypeRegistry::standard().null_expression(DType::NumRange);
    }
    let mut tokens = vec![ExpressionToken::Raw("case".to_string())];
    for range in ranges {
        let arm = Expression::construct(
            &format!(
                " when {} then {}",
                range_condition(range),
                range_literal(range)
            ),
            &[series as &dyn AsExpression, series],
        )?;
        tokens.extend(arm.tokens().iter().cloned());
    }
    tokens.push(ExpressionToken::Raw(" else null end".to_string()));
    Ok(Expression::new(tokens))
}
