//! SQL fragment model.
//!
//! - [`token`] - the constrained token vocabulary
//! - [`expression`] - the `Expression` composite and its rendering
//! - [`dialect`] - identifier quoting, literal escaping, percentile names

pub mod dialect;
pub mod expression;
pub mod token;

pub use dialect::{Dialect, SqlDialect};
pub use expression::{AsExpression, Expression};
pub use token::ExpressionToken;
