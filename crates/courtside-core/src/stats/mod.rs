// Statistics pipeline: raw box scores -> fact table -> consistency metrics.

pub mod aggregate;
pub mod facts;
pub mod games;
pub mod metric;
pub mod normalize;
pub mod outlier;
pub mod pipeline;
pub mod raw;
pub mod rolling;
pub mod summary;
