//! SQL dialect definitions and formatting rules.
//!
//! The core consumes a dialect for exactly three things: identifier
//! quoting, string-literal escaping, and the spelling of the percentile
//! aggregate. Everything else the core emits is plain ANSI SQL.

/// SQL dialect trait - defines quoting and function-name rules.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    ///
    /// Both supported dialects use ANSI double quotes, with embedded
    /// quotes doubled.
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a string literal. Backslashes and single quotes are escaped.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }

    /// Database type name for a double-precision float.
    fn double_precision_type(&self) -> &'static str {
        "double precision"
    }

    /// Render a continuous-percentile aggregate over `operand` at `fraction`.
    fn percentile_expr(&self, operand: &str, fraction: f64) -> String;
}

/// PostgreSQL dialect, the primary target.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn percentile_expr(&self, operand: &str, fraction: f64) -> String {
        let mut buffer = ryu::Buffer::new();
        format!(
            "percentile_cont({}) within group (order by {})",
            buffer.format(fraction),
            operand
        )
    }
}

/// DuckDB dialect. Quoting matches Postgres; the percentile aggregate
/// takes the operand as a regular argument.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn percentile_expr(&self, operand: &str, fraction: f64) -> String {
        let mut buffer = ryu::Buffer::new();
        format!("quantile_cont({}, {})", operand, buffer.format(fraction))
    }
}

/// Supported dialects as a convenient enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    DuckDb,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::DuckDb => &DuckDb,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn double_precision_type(&self) -> &'static str {
        self.dialect().double_precision_type()
    }

    fn percentile_expr(&self, operand: &str, fraction: f64) -> String {
        self.dialect().percentile_expr(operand, fraction)
    }
}
