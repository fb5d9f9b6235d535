//! Expression tokens - the atomic units of a SQL fragment.
//!
//! Tokens do not attempt full SQL tokenization. Most SQL is carried as a
//! `Raw` token; the remaining variants exist where deferred handling is
//! required: identifier quoting, literal escaping and model references.
//!
//! Adding a new variant here will cause compile errors at the resolve and
//! render choke points (exhaustive matching).

use std::sync::Arc;

use crate::graph::SqlModel;

/// A single token in an [`Expression`](crate::sql::Expression).
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionToken {
    /// Opaque SQL text, inserted verbatim at render time (brace-escaped
    /// so it cannot collide with the graph compiler's `{name}` syntax).
    Raw(String),

    /// A column name awaiting table qualification. Must be resolved to a
    /// `Raw` token before rendering; hitting one at render time is a bug
    /// in the calling layer.
    ColumnReference(String),

    /// Non-owning reference to a query-graph node. The node's lifetime is
    /// owned by the graph; the token only pins it via `Arc`.
    ModelReference(Arc<SqlModel>),

    /// An unescaped, unquoted string value. Quoting and escaping happen
    /// at render time only, keeping a single injection-defense point.
    StringValue(String),
}

impl ExpressionToken {
    /// The deterministic reference name for a `ModelReference` token.
    ///
    /// Purely a function of the node's content hash: structurally
    /// identical nodes share a name, which is what lets the compiler
    /// substitute each distinct subquery exactly once.
    pub fn refname(model: &SqlModel) -> String {
        format!("reference{}", model.hash())
    }
}

/// Escape literal braces so raw SQL survives the graph compiler's
/// `{name}` placeholder substitution untouched.
pub(crate) fn escape_format_string(s: &str) -> String {
    s.replace('{', "{{").replace('}', "}}")
}
