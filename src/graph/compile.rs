//! Compilation of a query graph into one executable statement.
//!
//! Starting from a root node, every `{referenceNAME}` placeholder is
//! substituted with the referenced node's compiled text: subquery nodes
//! are inlined in parentheses at each reference site, CTE nodes are
//! hoisted into a single `with` clause, deduplicated by content hash and
//! emitted in dependency order.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, SqlFrameError};
use crate::graph::model::{Materialization, SqlModel};
use crate::sql::dialect::{Dialect, SqlDialect};

/// Compile `root` and everything it references into one SQL statement.
pub fn compile(root: &Arc<SqlModel>, dialect: Dialect) -> Result<String> {
    let mut seen = HashSet::new();
    let mut ctes = Vec::new();
    collect_ctes(root, &mut seen, &mut ctes);

    let body = expand(root, dialect)?;
    let sql = if ctes.is_empty() {
        body
    } else {
        let mut clauses = Vec::with_capacity(ctes.len());
        for cte in &ctes {
            clauses.push(format!(
                "{} as ({})",
                dialect.quote_identifier(&cte.cte_name()),
                expand(cte, dialect)?
            ));
        }
        format!("with {} {}", clauses.join(", "), body)
    };
    debug!(root = root.name(), ctes = ctes.len(), "compiled query graph");
    Ok(sql)
}

/// Post-order walk collecting CTE nodes, deduplicated by hash, so every
/// CTE appears after the CTEs it depends on.
fn collect_ctes(node: &Arc<SqlModel>, seen: &mut HashSet<String>, out: &mut Vec<Arc<SqlModel>>) {
    for reference in node.references().values() {
        collect_ctes(reference, seen, out);
    }
    if node.materialization() == Materialization::Cte && seen.insert(node.hash().to_string()) {
        out.push(Arc::clone(node));
    }
}

/// Substitute this node's placeholders. Subquery references are expanded
/// recursively; CTE references resolve to their hoisted name.
fn expand(node: &Arc<SqlModel>, dialect: Dialect) -> Result<String> {
    let mut substitutions = BTreeMap::new();
    for (refname, reference) in node.references() {
        let text = match reference.materialization() {
            Materialization::Cte => dialect.quote_identifier(&reference.cte_name()),
            Materialization::Subquery => format!("({})", expand(reference, dialect)?),
        };
        substitutions.insert(refname.clone(), text);
    }
    format_sql(node.sql(), &substitutions)
}

/// Apply `{name}` substitutions to a template, honoring `{{`/`}}` escapes.
///
/// A placeholder with no matching substitution, or an unbalanced brace,
/// is an internal invariant violation.
pub(crate) fn format_sql(template: &str, substitutions: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(SqlFrameError::UnresolvedReference(format!(
                                "unterminated placeholder '{{{name}' in SQL template"
                            )))
                        }
                    }
                }
                match substitutions.get(&name) {
                    Some(text) => out.push_str(text),
                    None => {
                        return Err(SqlFrameError::UnresolvedReference(format!(
                            "no substitution provided for placeholder '{{{name}}}'"
                        )))
                    }
                }
            }
            '}' => {
                return Err(SqlFrameError::UnresolvedReference(
                    "unbalanced '}' in SQL template".to_string(),
                ))
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}
