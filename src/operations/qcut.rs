//! Quantile-based bucketing of a numeric column.
//!
//! One query computes every requested quantile boundary through the
//! dialect's continuous-percentile aggregate; duplicate boundaries are
//! dropped host-side, and the result frame classifies rows against the
//! surviving buckets.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::dtype::{DType, NumRange};
#[cfg(test)]
use crate::dtype::Value;
use crate::error::{Result, SqlFrameError};
use crate::frame::{DataFrame, Series};
use crate::graph::{self, Materialization, SqlModel};
use crate::operations::classification_case;
use crate::sql::dialect::SqlDialect;
use crate::sql::expression::AsExpression;

/// The quantile boundaries to compute: an even split into `Count`
/// buckets, or explicit `Fractions` in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub enum QuantileSpec {
    Count(usize),
    Fractions(Vec<f64>),
}

impl From<usize> for QuantileSpec {
    fn from(count: usize) -> Self {
        QuantileSpec::Count(count)
    }
}

impl From<Vec<f64>> for QuantileSpec {
    fn from(fractions: Vec<f64>) -> Self {
        QuantileSpec::Fractions(fractions)
    }
}

/// Quantile cut of a numeric column.
#[derive(Debug, Clone)]
pub struct QCutOperation {
    series: Series,
    quantiles: QuantileSpec,
}

impl QCutOperation {
    pub fn new(series: Series, quantiles: impl Into<QuantileSpec>) -> Self {
        Self {
            series,
            quantiles: quantiles.into(),
        }
    }

    /// Run the boundary query and build the classified frame.
    ///
    /// Equal adjacent boundaries are merged (pandas `duplicates='drop'`).
    /// With fewer than two distinct boundaries every row classifies to
    /// null. The first bucket is closed on both sides so the minimum
    /// classifies into it; later buckets are left-open.
    pub fn call(&self) -> Result<DataFrame> {
        self.validate()?;
        let fractions = self.fractions()?;
        let boundaries = self.boundaries(&fractions)?;
        let ranges: Vec<NumRange> = boundaries
            .windows(2)
            .enumerate()
            .map(|(i, edge)| NumRange::new(edge[0], edge[1], i == 0, true))
            .collect();
        debug!(
            column = self.series.name(),
            buckets = ranges.len(),
            "computed qcut buckets"
        );
        self.build_frame(&ranges)
    }

    fn validate(&self) -> Result<()> {
        if self.series.is_aggregated() || self.series.group_by().is_some() {
            return Err(SqlFrameError::UnsupportedOperation(
                "qcut requires an ungrouped, non-aggregated column".to_string(),
            ));
        }
        if !matches!(self.series.dtype(), DType::Int64 | DType::Float64) {
            return Err(SqlFrameError::UnsupportedOperation(format!(
                "qcut requires a numeric column, got {}",
                self.series.dtype()
            )));
        }
        Ok(())
    }

    fn fractions(&self) -> Result<Vec<f64>> {
        match &self.quantiles {
            QuantileSpec::Count(0) => Err(SqlFrameError::UnsupportedOperation(
                "qcut requires at least one quantile bucket".to_string(),
            )),
            QuantileSpec::Count(count) => Ok((0..=*count)
                .map(|i| i as f64 / *count as f64)
                .collect()),
            QuantileSpec::Fractions(fractions) => {
                let ordered = fractions
                    .windows(2)
                    .all(|pair| pair[0] < pair[1]);
                let in_range = fractions.iter().all(|f| (0.0..=1.0).contains(f));
                if !ordered || !in_range {
                    return Err(SqlFrameError::UnsupportedOperation(
                        "quantile fractions must be strictly ascending and within [0, 1]"
                            .to_string(),
                    ));
                }
                Ok(fractions.clone())
            }
        }
    }

    /// One query computing every boundary, duplicates dropped.
    fn boundaries(&self, fractions: &[f64]) -> Result<Vec<f64>> {
        if fractions.len() < 2 {
            return Ok(Vec::new());
        }
        let dialect = self.series.engine().dialect();
        let base = self.series.base_node();
        let column = self.series.expression().to_sql(dialect, None)?;

        let select: Vec<String> = fractions
            .iter()
            .enumerate()
            .map(|(i, fraction)| {
                format!(
                    "{} as {}",
                    dialect.percentile_expr(&column, *fraction),
                    dialect.quote_identifier(&format!("q{i}"))
                )
            })
            .collect();
        let sql = format!(
            "select {} from {{{}}} as {}",
            select.join(", "),
            base.refname(),
            dialect.quote_identifier(base.name()),
        );
        let mut references = self.series.expression().get_references();
        references.insert(base.refname(), Arc::clone(base));
        let node = Arc::new(SqlModel::new(
            "quantile_boundaries",
            sql,
            references,
            Materialization::Subquery,
        )?);
        let statement = graph::compile(&node, dialect)?;
        let rows = self.series.engine().fetch(&statement)?;

        let row = rows.first().ok_or_else(|| {
            SqlFrameError::UnsupportedOperation(
                "qcut: input column has no non-null values".to_string(),
            )
        })?;
        let mut boundaries = Vec::with_capacity(row.len());
        for value in row {
            let boundary = value.as_f64().ok_or_else(|| {
                SqlFrameError::UnsupportedOperation(
                    "qcut: input column has no non-null values".to_string(),
                )
            })?;
            if boundaries.last() != Some(&boundary) {
                boundaries.push(boundary);
            }
        }
        Ok(boundaries)
    }

    fn build_frame(&self, ranges: &[NumRange]) -> Result<DataFrame> {
        let dialect = self.series.engine().dialect();
        let base = self.series.base_node();
        let range_name = format!("{}_range", self.series.name());

        let case = classification_case(&self.series, ranges)?;
        let sql = format!(
            "select {} as {} from {{{}}} as {}",
            case.to_sql(dialect, None)?,
            dialect.quote_identifier(&range_name),
            base.refname(),
            dialect.quote_identifier(base.name()),
        );
        let mut references: BTreeMap<String, Arc<SqlModel>> = case.get_references();
        references.insert(base.refname(), Arc::clone(base));
        let node = Arc::new(SqlModel::new(
            format!("{}_qcut", self.series.name()),
            sql,
            references,
            Materialization::Subquery,
        )?);

        Ok(DataFrame::from_series(Series::new(
            Arc::clone(self.series.engine()),
            node,
            &range_name,
            DType::NumRange,
        )))
    }
}
