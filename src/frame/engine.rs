//! The execute-and-fetch capability consumed from the engine collaborator.

use crate::dtype::Value;
use crate::error::Result;
use crate::sql::Dialect;

/// A database connection capable of executing one compiled statement and
/// returning rows as host values.
///
/// The core issues at most one synchronous `fetch` per materialization
/// point and treats it as atomic: it either returns a full result set or
/// fails. Cancellation and timeouts are the engine's responsibility.
pub trait Engine: std::fmt::Debug + Send + Sync {
    /// The dialect this engine speaks; selects quoting and function names.
    fn dialect(&self) -> Dialect;

    /// Execute `sql` and return all rows.
    fn fetch(&self, sql: &str) -> Result<Vec<Vec<Value>>>;
}
