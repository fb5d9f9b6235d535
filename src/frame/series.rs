//! A single typed column and its aggregation state.
//!
//! A `Series` is a column expression bound to a base query-graph node.
//! Every operation is deferred: arithmetic, comparisons, casts and
//! aggregates only build new expressions. The aggregation state machine
//! lives here: a column whose expression is a single aggregated value
//! cannot feed another aggregate until the frame is materialized, because
//! SQL cannot nest aggregate calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dtype::rules::DATE_ROUNDING_TEMPLATE;
use crate::dtype::{ArithmeticOp, ComparisonOp, DType, DtypeRegistry, Value};
use crate::error::{Result, SqlFrameError};
use crate::frame::engine::Engine;
use crate::frame::grouping::GroupBy;
use crate::graph::{Materialization, SqlModel};
use crate::sql::dialect::SqlDialect;
use crate::sql::{AsExpression, Expression};

/// A typed column expression bound to a base node.
#[derive(Debug, Clone)]
pub struct Series {
    engine: Arc<dyn Engine>,
    base_node: Arc<SqlModel>,
    name: String,
    expression: Expression,
    dtype: DType,
    group_by: Option<GroupBy>,
    aggregated: bool,
}

impl AsExpression for Series {
    fn expression(&self) -> &Expression {
        &self.expression
    }
}

impl Series {
    /// A column of `base_node`, referenced by name.
    pub fn new(
        engine: Arc<dyn Engine>,
        base_node: Arc<SqlModel>,
        name: impl Into<String>,
        dtype: DType,
    ) -> Self {
        let name = name.into();
        Self {
            engine,
            base_node,
            expression: Expression::column_reference(&name),
            name,
            dtype,
            group_by: None,
            aggregated: false,
        }
    }

    /// A constant column sharing this series' lineage, built from a host
    /// value via the dtype registry's literal rules.
    pub fn constant(&self, value: &Value) -> Result<Series> {
        let (dtype, expression) = DtypeRegistry::standard().value_to_expression(value)?;
        Ok(Series {
            engine: Arc::clone(&self.engine),
            base_node: Arc::clone(&self.base_node),
            name: self.name.clone(),
            expression,
            dtype,
            group_by: self.group_by.clone(),
            aggregated: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn base_node(&self) -> &Arc<SqlModel> {
        &self.base_node
    }

    pub fn group_by(&self) -> Option<&GroupBy> {
        self.group_by.as_ref()
    }

    /// True if the expression is a single aggregated value (one row per
    /// group once materialized).
    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Series {
        self.name = name.into();
        self
    }

    pub(crate) fn with_group_by(mut self, group_by: Option<GroupBy>) -> Series {
        self.group_by = group_by;
        self
    }

    /// New series with the same lineage but a different expression.
    fn derived(&self, expression: Expression, dtype: DType, aggregated: bool) -> Series {
        Series {
            engine: Arc::clone(&self.engine),
            base_node: Arc::clone(&self.base_node),
            name: self.name.clone(),
            expression,
            dtype,
            group_by: self.group_by.clone(),
            aggregated,
        }
    }

    fn check_compatible(&self, other: &Series, operation: &str) -> Result<()> {
        if self.base_node != other.base_node {
            return Err(SqlFrameError::IncompatibleFrame {
                reason: format!(
                    "'{operation}': columns '{}' and '{}' are built on different base nodes",
                    self.name, other.name
                ),
            });
        }
        if self.group_by != other.group_by {
            return Err(SqlFrameError::IncompatibleFrame {
                reason: format!(
                    "'{operation}': columns '{}' and '{}' have different grouping constructs",
                    self.name, other.name
                ),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Casts and operators
    // =========================================================================

    /// Convert to another dtype, per the target's cast allow-list.
    pub fn astype(&self, target: DType) -> Result<Series> {
        let expression =
            DtypeRegistry::standard().dtype_to_expression(self.dtype, target, &self.expression)?;
        Ok(self.derived(expression, target, self.aggregated))
    }

    /// Combine with another column through an arithmetic operator.
    ///
    /// The operand pair must be whitelisted for the operator; the result
    /// dtype comes from the declared mapping table.
    pub fn arithmetic(&self, op: ArithmeticOp, other: &Series) -> Result<Series> {
        self.check_compatible(other, op.name())?;
        let rule = DtypeRegistry::standard().arithmetic_rule(op, self.dtype, other.dtype)?;
        let mut expression =
            Expression::construct(&rule.template, &[self as &dyn AsExpression, other])?;
        if rule.cast_result_to_date {
            expression =
                Expression::construct(DATE_ROUNDING_TEMPLATE, &[&expression as &dyn AsExpression])?;
        }
        Ok(self.derived(expression, rule.result, self.aggregated || other.aggregated))
    }

    pub fn add(&self, other: &Series) -> Result<Series> {
        self.arithmetic(ArithmeticOp::Add, other)
    }

    pub fn sub(&self, other: &Series) -> Result<Series> {
        self.arithmetic(ArithmeticOp::Sub, other)
    }

    pub fn mul(&self, other: &Series) -> Result<Series> {
        self.arithmetic(ArithmeticOp::Mul, other)
    }

    pub fn div(&self, other: &Series) -> Result<Series> {
        self.arithmetic(ArithmeticOp::Div, other)
    }

    pub fn floordiv(&self, other: &Series) -> Result<Series> {
        self.arithmetic(ArithmeticOp::FloorDiv, other)
    }

    /// Compare with another column; the result is a bool column.
    pub fn compare(&self, op: ComparisonOp, other: &Series) -> Result<Series> {
        self.check_compatible(other, &format!("comparator '{}'", op.symbol()))?;
        let rule = DtypeRegistry::standard().comparison_rule(op, self.dtype, other.dtype)?;
        let expression =
            Expression::construct(&rule.template, &[self as &dyn AsExpression, other])?;
        Ok(self.derived(expression, rule.result, self.aggregated || other.aggregated))
    }

    // =========================================================================
    // Aggregation state machine
    // =========================================================================

    fn check_not_aggregated(&self, function: &str) -> Result<()> {
        if self.aggregated {
            return Err(SqlFrameError::AlreadyAggregated {
                column: self.name.clone(),
                function: function.to_string(),
            });
        }
        Ok(())
    }

    fn require_numeric(&self, function: &str) -> Result<()> {
        if !matches!(self.dtype, DType::Int64 | DType::Float64) {
            return Err(SqlFrameError::UnsupportedOperation(format!(
                "{function} requires a numeric column, got {}",
                self.dtype
            )));
        }
        Ok(())
    }

    fn ddof_unsupported(&self, function: &str, ddof: Option<i64>) -> Result<()> {
        // Only the default one-degree-of-freedom correction is supported.
        if let Some(d) = ddof {
            if d != 1 {
                return Err(SqlFrameError::UnsupportedOperation(format!(
                    "{function} with ddof != 1 currently not implemented"
                )));
            }
        }
        Ok(())
    }

    fn derived_agg(&self, function: &str, fmt: &str, dtype: DType) -> Result<Series> {
        self.check_not_aggregated(function)?;
        let expression = Expression::construct(fmt, &[self as &dyn AsExpression])?;
        Ok(self.derived(expression, dtype, true))
    }

    pub fn sum(&self) -> Result<Series> {
        if !matches!(
            self.dtype,
            DType::Int64 | DType::Float64 | DType::Timedelta
        ) {
            return Err(SqlFrameError::UnsupportedOperation(format!(
                "sum requires a numeric or timedelta column, got {}",
                self.dtype
            )));
        }
        self.derived_agg("sum", "sum({})", self.dtype)
    }

    pub fn count(&self) -> Result<Series> {
        self.derived_agg("count", "count({})", DType::Int64)
    }

    /// Number of distinct values.
    pub fn nunique(&self) -> Result<Series> {
        self.derived_agg("nunique", "count(distinct {})", DType::Int64)
    }

    pub fn mean(&self) -> Result<Series> {
        match self.dtype {
            DType::Int64 | DType::Float64 => {
                self.derived_agg("mean", "cast(avg({}) as double precision)", DType::Float64)
            }
            DType::Timedelta => self.derived_agg("mean", "avg({})", DType::Timedelta),
            dtype => Err(SqlFrameError::UnsupportedOperation(format!(
                "mean requires a numeric or timedelta column, got {dtype}"
            ))),
        }
    }

    pub fn min(&self) -> Result<Series> {
        self.min_max("min")
    }

    pub fn max(&self) -> Result<Series> {
        self.min_max("max")
    }

    fn min_max(&self, function: &str) -> Result<Series> {
        if matches!(self.dtype, DType::Bool | DType::NumRange) {
            return Err(SqlFrameError::UnsupportedOperation(format!(
                "{function} is not supported for {} columns",
                self.dtype
            )));
        }
        self.derived_agg(function, &format!("{function}({{}})"), self.dtype)
    }

    /// Sample standard deviation. Only the default ddof of 1 is supported.
    pub fn std(&self, ddof: Option<i64>) -> Result<Series> {
        self.require_numeric("std")?;
        self.ddof_unsupported("std", ddof)?;
        self.derived_agg("std", "stddev_samp({})", DType::Float64)
    }

    /// Sample variance. Only the default ddof of 1 is supported.
    pub fn var(&self, ddof: Option<i64>) -> Result<Series> {
        self.require_numeric("var")?;
        self.ddof_unsupported("var", ddof)?;
        self.derived_agg("var", "var_samp({})", DType::Float64)
    }

    /// Standard error of the mean: std / sqrt(count).
    pub fn sem(&self, ddof: Option<i64>) -> Result<Series> {
        self.require_numeric("sem")?;
        self.ddof_unsupported("sem", ddof)?;
        let std = self.std(ddof)?;
        let count = self.count()?;
        let expression =
            Expression::construct("{} / sqrt({})", &[&std as &dyn AsExpression, &count])?;
        Ok(self.derived(expression, DType::Float64, true))
    }

    /// Product of all values.
    ///
    /// There is no native product aggregate; this is the
    /// `exp(sum(ln(x)))` workaround, which is invalid for zero or
    /// negative inputs.
    pub fn product(&self) -> Result<Series> {
        self.require_numeric("product")?;
        self.derived_agg("product", "exp(sum(ln({})))", DType::Float64)
    }

    pub fn prod(&self) -> Result<Series> {
        self.product()
    }

    /// Median via the dialect's continuous-percentile aggregate.
    pub fn median(&self) -> Result<Series> {
        self.require_numeric("median")?;
        let fmt = self.engine.dialect().percentile_expr("{}", 0.5);
        self.derived_agg("median", &fmt, DType::Float64)
    }

    pub fn kurtosis(&self) -> Result<Series> {
        Err(SqlFrameError::UnsupportedOperation(
            "kurtosis currently not implemented".to_string(),
        ))
    }

    pub fn kurt(&self) -> Result<Series> {
        self.kurtosis()
    }

    pub fn skew(&self) -> Result<Series> {
        Err(SqlFrameError::UnsupportedOperation(
            "skew currently not implemented".to_string(),
        ))
    }

    pub fn mad(&self) -> Result<Series> {
        Err(SqlFrameError::UnsupportedOperation(
            "mad currently not implemented".to_string(),
        ))
    }

    // =========================================================================
    // Materialization
    // =========================================================================

    /// Force the current state into a new query-graph node.
    ///
    /// The returned series references the column of the wrapped query,
    /// with the aggregation flag and grouping construct reset, so further
    /// aggregation is permitted.
    pub fn materialize(&self) -> Result<Series> {
        let dialect = self.engine.dialect();
        let mut select = Vec::new();
        if let Some(group_by) = &self.group_by {
            for key in group_by.keys() {
                select.push(dialect.quote_identifier(key));
            }
        }
        select.push(format!(
            "{} as {}",
            self.expression.to_sql(dialect, None)?,
            dialect.quote_identifier(&self.name)
        ));

        let mut references: BTreeMap<String, Arc<SqlModel>> = self.expression.get_references();
        references.insert(self.base_node.refname(), Arc::clone(&self.base_node));

        let mut sql = format!(
            "select {} from {{{}}} as {}",
            select.join(", "),
            self.base_node.refname(),
            dialect.quote_identifier(self.base_node.name()),
        );
        if let Some(group_by) = &self.group_by {
            if self.aggregated {
                sql.push_str(&format!(
                    " group by {}",
                    group_by.group_by_expression(dialect)
                ));
            }
        }

        let node = Arc::new(SqlModel::new(
            format!("{}_materialized", self.name),
            sql,
            references,
            Materialization::Subquery,
        )?);
        Ok(Series::new(
            Arc::clone(&self.engine),
            node,
            &self.name,
            self.dtype,
        ))
    }
}
