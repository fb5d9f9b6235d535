//! Equal-width bucketing of a numeric column.
//!
//! One aggregate query fetches the column's min and max; the bucket edges
//! are computed host-side with the pandas boundary adjustments, and the
//! result frame classifies every row into a `numrange` literal via a
//! single `case` expression.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::dtype::{DType, NumRange, Value};
use crate::error::{Result, SqlFrameError};
use crate::frame::{DataFrame, Series};
use crate::graph::{self, Materialization, SqlModel};
use crate::operations::{classification_case, range_condition, range_literal};
use crate::sql::dialect::SqlDialect;
use crate::sql::expression::AsExpression;

/// Relative widening applied to the outermost bucket edge so boundary
/// values classify into a bucket instead of falling out of range.
const RANGE_ADJUSTMENT: f64 = 0.001;

/// Min, max and derived step of the bucketed column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BucketProperties {
    min: f64,
    max: f64,
    bin_adjustment: f64,
    step: f64,
}

/// Equal-width cut of a numeric column into `bins` buckets.
#[derive(Debug, Clone)]
pub struct CutOperation {
    series: Series,
    bins: usize,
    right: bool,
    include_empty_bins: bool,
    ignore_index: bool,
}

impl CutOperation {
    pub fn new(series: Series, bins: usize) -> Self {
        Self {
            series,
            bins,
            right: true,
            include_empty_bins: false,
            ignore_index: true,
        }
    }

    /// Close buckets on the right (the default) or on the left.
    pub fn right(mut self, right: bool) -> Self {
        self.right = right;
        self
    }

    /// Also emit one null-valued row per bucket that matched no data.
    pub fn include_empty_bins(mut self, include: bool) -> Self {
        self.include_empty_bins = include;
        self
    }

    /// Keep the source column alongside the bucket column when false.
    pub fn ignore_index(mut self, ignore: bool) -> Self {
        self.ignore_index = ignore;
        self
    }

    /// Run the boundary query and build the classified frame.
    ///
    /// The returned frame holds a `<column>_range` column of dtype
    /// numrange; rows with a null source value classify to null.
    pub fn call(&self) -> Result<DataFrame> {
        self.validate()?;
        let properties = self.bucket_properties()?;
        let ranges = self.bucket_ranges(&properties);
        debug!(
            column = self.series.name(),
            bins = self.bins,
            min = properties.min,
            max = properties.max,
            "computed cut buckets"
        );
        self.build_frame(&ranges)
    }

    fn validate(&self) -> Result<()> {
        if self.bins == 0 {
            return Err(SqlFrameError::UnsupportedOperation(
                "cut requires at least one bin".to_string(),
            ));
        }
        if self.series.is_aggregated() || self.series.group_by().is_some() {
            return Err(SqlFrameError::UnsupportedOperation(
                "cut requires an ungrouped, non-aggregated column".to_string(),
            ));
        }
        if !matches!(self.series.dtype(), DType::Int64 | DType::Float64) {
            return Err(SqlFrameError::UnsupportedOperation(format!(
                "cut requires a numeric column, got {}",
                self.series.dtype()
            )));
        }
        Ok(())
    }

    /// One aggregate query for the column's min and max, then the pandas
    /// edge adjustments applied host-side.
    fn bucket_properties(&self) -> Result<BucketProperties> {
        let dialect = self.series.engine().dialect();
        let base = self.series.base_node();
        let column = self.series.expression().to_sql(dialect, None)?;

        let sql = format!(
            "select min({column}) as {}, max({column}) as {} from {{{}}} as {}",
            dialect.quote_identifier("range_min"),
            dialect.quote_identifier("range_max"),
            base.refname(),
            dialect.quote_identifier(base.name()),
        );
        let mut references = self.series.expression().get_references();
        references.insert(base.refname(), Arc::clone(base));
        let node = Arc::new(SqlModel::new(
            "bucket_properties",
            sql,
            references,
            Materialization::Subquery,
        )?);
        let statement = graph::compile(&node, dialect)?;
        let rows = self.series.engine().fetch(&statement)?;

        let (min, max) = match rows.first() {
            Some(row) => {
                let min = row.first().and_then(Value::as_f64);
                let max = row.get(1).and_then(Value::as_f64);
                match (min, max) {
                    (Some(min), Some(max)) => (min, max),
                    _ => {
                        return Err(SqlFrameError::UnsupportedOperation(
                            "cut: input column has no non-null values".to_string(),
                        ))
                    }
                }
            }
            None => {
                return Err(SqlFrameError::UnsupportedOperation(
                    "cut: input column has no non-null values".to_string(),
                ))
            }
        };

        // A constant column gets a symmetric widening so a real interval
        // exists; otherwise only the outermost edge is widened later.
        let (min, max, bin_adjustment) = if min == max {
            if min == 0.0 {
                (-RANGE_ADJUSTMENT, RANGE_ADJUSTMENT, 0.0)
            } else {
                (
                    min - RANGE_ADJUSTMENT * min.abs(),
                    max + RANGE_ADJUSTMENT * max.abs(),
                    0.0,
                )
            }
        } else {
            (min, max, (max - min) * RANGE_ADJUSTMENT)
        };

        Ok(BucketProperties {
            min,
            max,
            bin_adjustment,
            step: (max - min) / self.bins as f64,
        })
    }

    /// Evenly spaced edges, with the outermost open-side edge widened by
    /// the bin adjustment so the boundary value stays inside.
    fn bucket_ranges(&self, properties: &BucketProperties) -> Vec<NumRange> {
        let mut edges: Vec<f64> = (0..=self.bins)
            .map(|i| properties.min + properties.step * i as f64)
            .collect();
        // The last computed edge accumulates float error; pin it.
        edges[self.bins] = properties.max;
        if self.right {
            edges[0] = properties.min - properties.bin_adjustment;
        } else {
            edges[self.bins] = properties.max + properties.bin_adjustment;
        }
        edges
            .windows(2)
            .map(|edge| NumRange::new(edge[0], edge[1], !self.right, self.right))
            .collect()
    }

    fn build_frame(&self, ranges: &[NumRange]) -> Result<DataFrame> {
        let dialect = self.series.engine().dialect();
        let base = self.series.base_node();
        let range_name = format!("{}_range", self.series.name());

        let case = classification_case(&self.series, ranges)?;
        let case_sql = case.to_sql(dialect, None)?;
        let source_sql = self.series.expression().to_sql(dialect, None)?;

        let mut select = Vec::new();
        if !self.ignore_index {
            select.push(format!(
                "{source_sql} as {}",
                dialect.quote_identifier(self.series.name())
            ));
        }
        select.push(format!(
            "{case_sql} as {}",
            dialect.quote_identifier(&range_name)
        ));

        let mut sql = format!(
            "select {} from {{{}}} as {}",
            select.join(", "),
            base.refname(),
            dialect.quote_identifier(base.name()),
        );
        if self.include_empty_bins {
            for range in ranges {
                let condition = range_condition(range).replace("{}", &source_sql);
                let mut arm = Vec::new();
                if !self.ignore_index {
                    arm.push(format!(
                        "cast(null as {}) as {}",
                        self.series.dtype().db_type(),
                        dialect.quote_identifier(self.series.name())
                    ));
                }
                arm.push(format!(
                    "{} as {}",
                    range_literal(range),
                    dialect.quote_identifier(&range_name)
                ));
                sql.push_str(&format!(
                    " union all select {} where not exists \
                     (select 1 from {{{}}} as {} where {})",
                    arm.join(", "),
                    base.refname(),
                    dialect.quote_identifier(base.name()),
                    condition,
                ));
            }
        }

        let mut references: BTreeMap<String, Arc<SqlModel>> = case.get_references();
        references.insert(base.refname(), Arc::clone(base));
        let node = Arc::new(SqlModel::new(
            format!("{}_cut", self.series.name()),
            sql,
            references,
            Materialization::Subquery,
        )?);

        let range_series = Series::new(
            Arc::clone(self.series.engine()),
            Arc::clone(&node),
            &range_name,
            DType::NumRange,
        );
        if self.ignore_index {
            Ok(DataFrame::from_series(range_series))
        } else {
            let source = Series::new(
                Arc::clone(self.series.engine()),
                Arc::clone(&node),
                self.series.name(),
                self.series.dtype(),
            );
            DataFrame::from_series(source).with_series(range_series)
        }
    }
}
