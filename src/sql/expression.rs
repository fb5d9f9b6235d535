//! The `Expression` composite - an immutable, ordered token sequence
//! representing one fragment of SQL.
//!
//! Storing fragments as token sequences instead of strings is what makes
//! deferred table-qualification, centralized literal escaping and model
//! references possible. Expressions are value types: every transformation
//! returns a new `Expression`, construction never re-orders tokens, and
//! rendering the same tokens always yields the same SQL.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, SqlFrameError};
use crate::graph::SqlModel;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::token::{escape_format_string, ExpressionToken};

/// Anything that can stand in for an expression in template composition.
///
/// Implemented by [`Expression`] itself and by `Series`, so the same
/// `construct` call accepts both values and column-like inputs.
pub trait AsExpression {
    fn expression(&self) -> &Expression;
}

impl AsExpression for Expression {
    fn expression(&self) -> &Expression {
        self
    }
}

/// An ordered, immutable sequence of SQL tokens.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expression {
    tokens: Vec<ExpressionToken>,
}

impl Expression {
    /// Create an expression from a token sequence.
    pub fn new(tokens: Vec<ExpressionToken>) -> Self {
        Self { tokens }
    }

    /// An expression holding a single `Raw` token.
    pub fn raw(raw: impl Into<String>) -> Self {
        Self::new(vec![ExpressionToken::Raw(raw.into())])
    }

    /// An expression holding a single `StringValue` token.
    ///
    /// `value` is the unquoted, unescaped string; escaping happens at
    /// render time.
    pub fn string_value(value: impl Into<String>) -> Self {
        Self::new(vec![ExpressionToken::StringValue(value.into())])
    }

    /// An expression referencing a column in a table or CTE.
    pub fn column_reference(column_name: impl Into<String>) -> Self {
        Self::new(vec![ExpressionToken::ColumnReference(column_name.into())])
    }

    /// An expression referencing a query-graph node.
    pub fn model_reference(model: Arc<SqlModel>) -> Self {
        Self::new(vec![ExpressionToken::ModelReference(model)])
    }

    /// Construct an expression from a format string referencing existing
    /// expressions.
    ///
    /// Every `{}` in `fmt` is replaced, in order, by the corresponding
    /// argument's full token sequence; the text between placeholders
    /// becomes `Raw` tokens. The number of `{}` occurrences must equal
    /// the number of arguments.
    pub fn construct(fmt: &str, args: &[&dyn AsExpression]) -> Result<Self> {
        let sub_strs: Vec<&str> = fmt.split("{}").collect();
        let expected = sub_strs.len() - 1;
        if args.len() != expected {
            return Err(SqlFrameError::ArgumentCount {
                expected,
                provided: args.len(),
            });
        }
        let mut tokens = Vec::new();
        for (i, sub_str) in sub_strs.iter().enumerate() {
            if i > 0 {
                tokens.extend(args[i - 1].expression().tokens.iter().cloned());
            }
            if !sub_str.is_empty() {
                tokens.push(ExpressionToken::Raw((*sub_str).to_string()));
            }
        }
        Ok(Self::new(tokens))
    }

    /// The token sequence, in order.
    pub fn tokens(&self) -> &[ExpressionToken] {
        &self.tokens
    }

    /// True if the expression holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Return a new expression with every `ColumnReference` replaced by a
    /// `Raw` token holding the quoted identifier, optionally qualified
    /// with the quoted `table_name.` prefix. All other tokens pass
    /// through unchanged.
    pub fn resolve_column_references(
        &self,
        dialect: Dialect,
        table_name: Option<&str>,
    ) -> Expression {
        let tokens = self
            .tokens
            .iter()
            .map(|token| match token {
                ExpressionToken::ColumnReference(column_name) => {
                    let prefix = match table_name {
                        Some(t) => format!("{}.", dialect.quote_identifier(t)),
                        None => String::new(),
                    };
                    ExpressionToken::Raw(format!(
                        "{}{}",
                        prefix,
                        dialect.quote_identifier(column_name)
                    ))
                }
                ExpressionToken::Raw(_)
                | ExpressionToken::ModelReference(_)
                | ExpressionToken::StringValue(_) => token.clone(),
            })
            .collect();
        Expression::new(tokens)
    }

    /// All query-graph nodes referenced by this expression, keyed by their
    /// deterministic reference name.
    ///
    /// The name is a pure function of each node's content hash, so calling
    /// this repeatedly returns identical results and structurally identical
    /// nodes collapse to a single entry.
    pub fn get_references(&self) -> BTreeMap<String, Arc<SqlModel>> {
        let mut references = BTreeMap::new();
        for token in &self.tokens {
            if let ExpressionToken::ModelReference(model) = token {
                references.insert(ExpressionToken::refname(model), Arc::clone(model));
            }
        }
        references
    }

    /// Serialize a resolved expression to a SQL fragment.
    ///
    /// `Raw` tokens are emitted verbatim, `StringValue` tokens are quoted
    /// and escaped, and `ModelReference` tokens become `{referenceNAME}`
    /// placeholders for the graph compiler. Both raw text and quoted
    /// strings are brace-escaped against the compiler's own placeholder
    /// syntax. An unresolved `ColumnReference` here is a programming
    /// error, never user-triggerable.
    pub fn render(&self, dialect: Dialect) -> Result<String> {
        let mut result = String::new();
        for token in &self.tokens {
            match token {
                ExpressionToken::ColumnReference(column_name) => {
                    return Err(SqlFrameError::UnresolvedReference(format!(
                        "column reference '{column_name}' must be resolved with \
                         resolve_column_references() before rendering"
                    )));
                }
                ExpressionToken::ModelReference(model) => {
                    result.push('{');
                    result.push_str(&ExpressionToken::refname(model));
                    result.push('}');
                }
                ExpressionToken::Raw(raw) => {
                    result.push_str(&escape_format_string(raw));
                }
                ExpressionToken::StringValue(value) => {
                    result.push_str(&escape_format_string(&dialect.quote_string(value)));
                }
            }
        }
        Ok(result)
    }

    /// Resolve column references against `table_name`, then render.
    pub fn to_sql(&self, dialect: Dialect, table_name: Option<&str>) -> Result<String> {
        self.resolve_column_references(dialect, table_name)
            .render(dialect)
    }
}
