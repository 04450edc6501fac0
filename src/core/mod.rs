pub mod dataset;
pub mod etl;
pub mod kpi;
pub mod normalize;
pub mod pipeline;
pub mod report;

pub use crate::domain::model::{DatasetRows, Record, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
