//! Query-graph collaborator: hash-identified SQL nodes and their
//! compilation into a single statement.

mod compile;
mod hash;
mod model;

pub use compile::compile;
pub use model::{Materialization, SqlModel};
