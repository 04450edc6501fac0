use crate::domain::model::{DatasetRows, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn data_dir(&self) -> &str;
    fn movement_file(&self) -> &str;
    fn performance_file(&self) -> &str;
    fn output_path(&self) -> &str;
    fn precision(&self) -> u32;
    fn output_formats(&self) -> &[String];
    fn row_limit(&self) -> Option<usize>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<DatasetRows>;
    async fn transform(&self, data: DatasetRows) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
