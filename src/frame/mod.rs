//! The frame layer: typed columns, grouping state and lazy frames.

pub mod dataframe;
pub mod engine;
pub mod grouping;
pub mod series;

pub use dataframe::DataFrame;
pub use engine::Engine;
pub use grouping::GroupBy;
pub use series::Series;
