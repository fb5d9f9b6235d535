//! The frame: an ordered collection of columns over one base node.
//!
//! A `DataFrame` never holds data. It tracks a base query-graph node, the
//! column expressions derived from it and an optional grouping construct,
//! and compiles the whole state into a single `select` on demand.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::dtype::{DType, Value};
use crate::error::{Result, SqlFrameError};
use crate::frame::engine::Engine;
use crate::frame::grouping::GroupBy;
use crate::frame::series::Series;
use crate::graph::{self, Materialization, SqlModel};
use crate::sql::dialect::SqlDialect;
use crate::sql::expression::AsExpression;

/// A lazy frame: columns over a shared base node, plus grouping state.
#[derive(Debug, Clone)]
pub struct DataFrame {
    engine: Arc<dyn Engine>,
    base_node: Arc<SqlModel>,
    columns: Vec<Series>,
    group_by: Option<GroupBy>,
}

impl DataFrame {
    /// A frame over a physical table with a declared column layout.
    ///
    /// No schema introspection happens; the caller declares the columns
    /// and their dtypes.
    pub fn from_table(
        engine: Arc<dyn Engine>,
        table_name: &str,
        columns: &[(&str, DType)],
    ) -> Result<DataFrame> {
        let dialect = engine.dialect();
        let base_node = Arc::new(SqlModel::table(dialect, table_name)?);
        let columns = columns
            .iter()
            .map(|(name, dtype)| {
                Series::new(Arc::clone(&engine), Arc::clone(&base_node), *name, *dtype)
            })
            .collect();
        Ok(DataFrame {
            engine,
            base_node,
            columns,
            group_by: None,
        })
    }

    /// A single-column frame wrapping an existing series.
    pub fn from_series(series: Series) -> DataFrame {
        DataFrame {
            engine: Arc::clone(series.engine()),
            base_node: Arc::clone(series.base_node()),
            group_by: series.group_by().cloned(),
            columns: vec![series],
        }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn base_node(&self) -> &Arc<SqlModel> {
        &self.base_node
    }

    pub fn group_by(&self) -> Option<&GroupBy> {
        self.group_by.as_ref()
    }

    pub fn columns(&self) -> &[Series] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&Series> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| SqlFrameError::UnknownColumn(name.to_string()))
    }

    /// A frame holding only the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<DataFrame> {
        let columns = names
            .iter()
            .map(|name| self.column(name).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrame {
            engine: Arc::clone(&self.engine),
            base_node: Arc::clone(&self.base_node),
            columns,
            group_by: self.group_by.clone(),
        })
    }

    /// Add a column, or replace the column with the same name.
    ///
    /// The series must share this frame's lineage: same base node and
    /// same grouping construct. Columns derived from a different node
    /// would silently join unrelated data, so that is rejected.
    pub fn with_series(&self, series: Series) -> Result<DataFrame> {
        if series.base_node() != &self.base_node {
            return Err(SqlFrameError::IncompatibleFrame {
                reason: format!(
                    "column '{}' is built on a different base node",
                    series.name()
                ),
            });
        }
        if series.group_by() != self.group_by.as_ref() {
            return Err(SqlFrameError::IncompatibleFrame {
                reason: format!(
                    "column '{}' has a different grouping construct",
                    series.name()
                ),
            });
        }
        let mut columns = self.columns.clone();
        match columns.iter_mut().find(|c| c.name() == series.name()) {
            Some(existing) => *existing = series,
            None => columns.push(series),
        }
        Ok(DataFrame {
            engine: Arc::clone(&self.engine),
            base_node: Arc::clone(&self.base_node),
            columns,
            group_by: self.group_by.clone(),
        })
    }

    // =========================================================================
    // Grouping
    // =========================================================================

    /// Apply a grouping construct. Keys are validated against the frame's
    /// columns and moved to the front; every column adopts the construct.
    fn grouped(&self, group_by: GroupBy) -> Result<DataFrame> {
        for key in group_by.keys() {
            self.column(key)?;
        }
        let keys = group_by.keys();
        let mut columns: Vec<Series> = Vec::with_capacity(self.columns.len());
        for key in &keys {
            columns.push(
                self.column(key)?
                    .clone()
                    .with_group_by(Some(group_by.clone())),
            );
        }
        for column in &self.columns {
            if !keys.contains(&column.name()) {
                columns.push(column.clone().with_group_by(Some(group_by.clone())));
            }
        }
        Ok(DataFrame {
            engine: Arc::clone(&self.engine),
            base_node: Arc::clone(&self.base_node),
            columns,
            group_by: Some(group_by),
        })
    }

    /// Group by plain columns.
    pub fn groupby(&self, keys: &[&str]) -> Result<DataFrame> {
        self.grouped(GroupBy::Columns(
            keys.iter().map(|k| (*k).to_string()).collect(),
        ))
    }

    /// Group by a list of parenthesized sub-groups.
    pub fn groupby_list(&self, groups: &[&[&str]]) -> Result<DataFrame> {
        self.grouped(GroupBy::GroupingList(owned_groups(groups)))
    }

    /// Group by explicit grouping sets. An empty set yields the
    /// grand-total row.
    pub fn groupby_sets(&self, sets: &[&[&str]]) -> Result<DataFrame> {
        self.grouped(GroupBy::GroupingSet(owned_groups(sets)))
    }

    /// Group by a rollup over `keys`.
    pub fn rollup(&self, keys: &[&str]) -> Result<DataFrame> {
        self.grouped(GroupBy::Rollup(
            keys.iter().map(|k| (*k).to_string()).collect(),
        ))
    }

    /// Group by a cube over `keys`.
    pub fn cube(&self, keys: &[&str]) -> Result<DataFrame> {
        self.grouped(GroupBy::Cube(
            keys.iter().map(|k| (*k).to_string()).collect(),
        ))
    }

    // =========================================================================
    // Aggregation
    // =========================================================================

    /// Apply aggregate functions to every non-key column.
    ///
    /// Each function yields a column named `<column>_<function>`. On an
    /// ungrouped frame this aggregates the whole frame into one row.
    pub fn agg(&self, functions: &[&str]) -> Result<DataFrame> {
        let keys: Vec<String> = match &self.group_by {
            Some(gb) => gb.keys().iter().map(|k| (*k).to_string()).collect(),
            None => Vec::new(),
        };
        let mut columns: Vec<Series> = Vec::new();
        for key in &keys {
            columns.push(self.column(key)?.clone());
        }
        for column in &self.columns {
            if keys.iter().any(|k| k == column.name()) {
                continue;
            }
            for function in functions {
                let aggregated = apply_aggregate(column, function)?
                    .with_name(format!("{}_{}", column.name(), function));
                columns.push(aggregated);
            }
        }
        Ok(DataFrame {
            engine: Arc::clone(&self.engine),
            base_node: Arc::clone(&self.base_node),
            columns,
            group_by: self.group_by.clone(),
        })
    }

    pub fn sum(&self) -> Result<DataFrame> {
        self.agg(&["sum"])
    }

    pub fn mean(&self) -> Result<DataFrame> {
        self.agg(&["mean"])
    }

    pub fn count(&self) -> Result<DataFrame> {
        self.agg(&["count"])
    }

    pub fn min(&self) -> Result<DataFrame> {
        self.agg(&["min"])
    }

    pub fn max(&self) -> Result<DataFrame> {
        self.agg(&["max"])
    }

    pub fn nunique(&self) -> Result<DataFrame> {
        self.agg(&["nunique"])
    }

    // =========================================================================
    // Compilation
    // =========================================================================

    /// Build the query-graph node representing the frame's current state.
    fn to_model(&self, name: &str) -> Result<Arc<SqlModel>> {
        let dialect = self.engine.dialect();
        let keys: Vec<&str> = match &self.group_by {
            Some(gb) => gb.keys(),
            None => Vec::new(),
        };
        if self.group_by.is_some() {
            for column in &self.columns {
                if !keys.contains(&column.name()) && !column.is_aggregated() {
                    return Err(SqlFrameError::UnsupportedOperation(format!(
                        "cannot compile a grouped frame: column '{}' is not \
                         aggregated; aggregate it or drop it first",
                        column.name()
                    )));
                }
            }
        }

        let mut select = Vec::with_capacity(self.columns.len());
        let mut references: BTreeMap<String, Arc<SqlModel>> = BTreeMap::new();
        references.insert(self.base_node.refname(), Arc::clone(&self.base_node));
        for column in &self.columns {
            select.push(format!(
                "{} as {}",
                column.expression().to_sql(dialect, None)?,
                dialect.quote_identifier(column.name())
            ));
            references.extend(column.expression().get_references());
        }

        let mut sql = format!(
            "select {} from {{{}}} as {}",
            select.join(", "),
            self.base_node.refname(),
            dialect.quote_identifier(self.base_node.name()),
        );
        if let Some(group_by) = &self.group_by {
            sql.push_str(&format!(
                " group by {}",
                group_by.group_by_expression(dialect)
            ));
        }

        Ok(Arc::new(SqlModel::new(
            name,
            sql,
            references,
            Materialization::Subquery,
        )?))
    }

    /// The single SQL statement representing the frame's current state.
    pub fn view_sql(&self) -> Result<String> {
        let model = self.to_model("view")?;
        graph::compile(&model, self.engine.dialect())
    }

    /// Wrap the current state into a new base node.
    ///
    /// All columns of the returned frame are plain references into the
    /// wrapped query; grouping and aggregation state are reset.
    pub fn materialize(&self, name: &str) -> Result<DataFrame> {
        let node = self.to_model(name)?;
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Series::new(
                    Arc::clone(&self.engine),
                    Arc::clone(&node),
                    c.name(),
                    c.dtype(),
                )
            })
            .collect();
        Ok(DataFrame {
            engine: Arc::clone(&self.engine),
            base_node: node,
            columns,
            group_by: None,
        })
    }

    /// Compile and execute, returning all rows.
    pub fn fetch(&self) -> Result<Vec<Vec<Value>>> {
        let sql = self.view_sql()?;
        debug!(columns = self.columns.len(), "fetching frame");
        self.engine.fetch(&sql)
    }
}

fn owned_groups(groups: &[&[&str]]) -> Vec<Vec<String>> {
    groups
        .iter()
        .map(|g| g.iter().map(|c| (*c).to_string()).collect())
        .collect()
}

/// Dispatch an aggregate by pandas-style name.
fn apply_aggregate(series: &Series, function: &str) -> Result<Series> {
    match function {
        "sum" => series.sum(),
        "count" => series.count(),
        "nunique" => series.nunique(),
        "mean" => series.mean(),
        "min" => series.min(),
        "max" => series.max(),
        "median" => series.median(),
        "std" => series.std(None),
        "var" => series.var(None),
        "sem" => series.sem(None),
        "product" | "prod" => series.product(),
        "kurtosis" | "kurt" => series.kurtosis(),
        "skew" => series.skew(),
        "mad" => series.mad(),
        other => Err(SqlFrameError::UnsupportedOperation(format!(
            "unknown aggregate function '{other}'"
        ))),
    }
}
