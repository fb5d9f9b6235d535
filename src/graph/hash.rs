//! Content identity for query-graph nodes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::graph::model::{Materialization, SqlModel};

/// The canonical form that feeds a node's identity: the SQL template,
/// each reference's hash under its placeholder name, and the
/// materialization mode. The display name deliberately does not
/// participate, so renaming a node cannot change what it deduplicates
/// against.
#[derive(Serialize)]
struct HashContent<'a> {
    sql: &'a str,
    references: BTreeMap<&'a str, &'a str>,
    materialization: Materialization,
}

/// SHA-256 over the canonical JSON serialization of a node's content,
/// as a 64-character lowercase hex string.
///
/// References collapse to their own hashes, so a node's identity covers
/// its whole subgraph; the `BTreeMap` serializes in key order, keeping
/// the digest independent of insertion order.
pub(crate) fn model_hash(
    sql: &str,
    references: &BTreeMap<String, Arc<SqlModel>>,
    materialization: Materialization,
) -> Result<String> {
    let content = HashContent {
        sql,
        references: references
            .iter()
            .map(|(name, node)| (name.as_str(), node.hash()))
            .collect(),
        materialization,
    };
    let json = serde_json::to_string(&content)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
