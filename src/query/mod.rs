mod builder;
pub mod catalogue;

pub use builder::{
    build, Aggregation, AggregationOp, LabelFilters, Query, RangeFunction, RangeTransform,
};
