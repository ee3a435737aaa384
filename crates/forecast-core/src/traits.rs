use async_trait::async_trait;
use crate::ForecastError;

/// Free-form analysis capability: prompt in, analyst text out.
#[async_trait]
pub trait IntelligenceProvider: Send + Sync {
    async fn analyze(&self, prompt: &str) -> Result<String, ForecastError>;
    fn name(&self) -> &str;
}

/// Structured extraction capability: turns analyst text into a raw response
/// that is expected (but not guaranteed) to contain a JSON object.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(
        &self,
        system_instructions: &str,
        input_text: &str,
    ) -> Result<String, ForecastError>;
    fn name(&self) -> &str;
}
