//! Grouping constructs - the shape of a SQL `group by` clause.

use crate::sql::dialect::{Dialect, SqlDialect};

/// The shape of a `group by` clause.
///
/// Two constructs are equal iff their variant and full nested key
/// structure are equal; this is what decides whether two independently
/// derived frames can be recombined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupBy {
    /// Plain `group by "a", "b"`.
    Columns(Vec<String>),
    /// Comma-joined parenthesized sub-groups: `("a"), ("b", "c")`.
    GroupingList(Vec<Vec<String>>),
    /// `grouping sets (("a"), ())`. An empty sub-group renders as `()`,
    /// the grand-total row.
    GroupingSet(Vec<Vec<String>>),
    /// `rollup ("a", "b")`.
    Rollup(Vec<String>),
    /// `cube ("a", "b")`.
    Cube(Vec<String>),
}

impl GroupBy {
    /// All distinct grouping keys in first-appearance order. These become
    /// the leading columns of an aggregated select list.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        fn add<'a>(keys: &mut Vec<&'a str>, key: &'a str) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        match self {
            GroupBy::Columns(cols) | GroupBy::Rollup(cols) | GroupBy::Cube(cols) => {
                for c in cols {
                    add(&mut keys, c.as_str());
                }
            }
            GroupBy::GroupingList(groups) | GroupBy::GroupingSet(groups) => {
                for group in groups {
                    for c in group {
                        add(&mut keys, c.as_str());
                    }
                }
            }
        }
        keys
    }

    /// Render the `group by` clause body for this construct.
    pub fn group_by_expression(&self, dialect: Dialect) -> String {
        let quote = |cols: &[String]| {
            cols.iter()
                .map(|c| dialect.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let sub_groups = |groups: &[Vec<String>]| {
            groups
                .iter()
                .map(|g| format!("({})", quote(g)))
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            GroupBy::Columns(cols) => quote(cols),
            GroupBy::GroupingList(groups) => sub_groups(groups),
            GroupBy::GroupingSet(groups) => format!("grouping sets ({})", sub_groups(groups)),
            GroupBy::Rollup(cols) => format!("rollup ({})", quote(cols)),
            GroupBy::Cube(cols) => format!("cube ({})", quote(cols)),
        }
    }
}
