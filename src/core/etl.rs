use crate::core::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        let started = Instant::now();
        tracing::info!("🚀 Starting KPI pipeline");

        // Extract
        let raw_data = self.pipeline.extract().await?;
        tracing::info!(
            "📥 Extracted {} movement rows, {} performance rows",
            raw_data.movements.len(),
            raw_data.performances.len()
        );

        // Transform
        let transformed = self.pipeline.transform(raw_data).await?;
        let undefined = transformed
            .reports
            .iter()
            .filter(|r| r.kpis.is_all_undefined())
            .count();
        tracing::info!(
            "🔄 Computed KPIs for {} route/week rows ({} with no defined KPI)",
            transformed.reports.len(),
            undefined
        );

        // Load
        let output_path = self.pipeline.load(transformed).await?;
        tracing::info!("📁 Output saved to: {} in {:?}", output_path, started.elapsed());

        Ok(output_path)
    }
}
