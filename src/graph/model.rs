//! Query-graph nodes.
//!
//! A [`SqlModel`] is an immutable, hash-identified unit of SQL (typically
//! one `select` statement) that other SQL fragments can reference without
//! owning. References are resolved by the compiler in [`crate::graph::compile`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::graph::hash::model_hash;
use crate::sql::dialect::{Dialect, SqlDialect};

/// How a referenced node is stitched into the final statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum Materialization {
    /// Inlined as a parenthesized subquery at every reference site.
    #[default]
    Subquery,
    /// Hoisted into the `with` clause and referenced by name.
    Cte,
}

/// An immutable query-graph node.
///
/// The node's identity is its content hash: a SHA256 digest over the SQL
/// template, the hashes of its references, and the materialization mode.
/// Structurally identical nodes therefore compare equal and collapse to a
/// single substitution in the compiled statement, no matter how many
/// expressions point at them.
#[derive(Debug)]
pub struct SqlModel {
    name: String,
    sql: String,
    references: BTreeMap<String, Arc<SqlModel>>,
    materialization: Materialization,
    hash: String,
}

impl SqlModel {
    /// Create a node from a SQL template.
    ///
    /// `sql` may contain `{referenceNAME}` placeholders for each entry in
    /// `references`, and `{{`/`}}` escapes for literal braces.
    pub fn new(
        name: impl Into<String>,
        sql: impl Into<String>,
        references: BTreeMap<String, Arc<SqlModel>>,
        materialization: Materialization,
    ) -> Result<Self> {
        let name = name.into();
        let sql = sql.into();
        let hash = model_hash(&sql, &references, materialization)?;
        Ok(Self {
            name,
            sql,
            references,
            materialization,
            hash,
        })
    }

    /// A leaf node selecting everything from a physical table.
    pub fn table(dialect: Dialect, table_name: &str) -> Result<Self> {
        Self::new(
            table_name,
            format!("select * from {}", dialect.quote_identifier(table_name)),
            BTreeMap::new(),
            Materialization::Subquery,
        )
    }

    /// The node's display name (not part of its identity).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The SQL template, with unresolved `{referenceNAME}` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The referenced nodes, keyed by placeholder name.
    pub fn references(&self) -> &BTreeMap<String, Arc<SqlModel>> {
        &self.references
    }

    pub fn materialization(&self) -> Materialization {
        self.materialization
    }

    /// The stable content hash identifying this node.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The deterministic placeholder name under which expressions refer
    /// to this node.
    pub fn refname(&self) -> String {
        format!("reference{}", self.hash)
    }

    /// The name this node takes when emitted as a CTE. Suffixed with a
    /// hash prefix so distinct nodes sharing a display name cannot clash.
    pub(crate) fn cte_name(&self) -> String {
        format!("{}_{}", self.name, &self.hash[..8])
    }
}

impl PartialEq for SqlModel {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for SqlModel {}

impl std::hash::Hash for SqlModel {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}
