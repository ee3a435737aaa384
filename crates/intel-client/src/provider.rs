use async_trait::async_trait;
use forecast_core::{ForecastError, IntelligenceProvider, StructuredExtractor};

use crate::GeminiClient;

/// Free-form analysis: a single plain generation request.
#[async_trait]
impl IntelligenceProvider for GeminiClient {
    async fn analyze(&self, prompt: &str) -> Result<String, ForecastError> {
        tracing::info!("Requesting analysis from {}", self.model());
        let text = self.generate(None, prompt, false).await?;
        tracing::debug!("Analysis returned {} bytes", text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Structured extraction: system instructions plus JSON response mode.
#[async_trait]
impl StructuredExtractor for GeminiClient {
    async fn extract(
        &self,
        system_instructions: &str,
        input_text: &str,
    ) -> Result<String, ForecastError> {
        tracing::info!("Requesting impact extraction from {}", self.model());
        Ok(self
            .generate(Some(system_instructions), input_text, true)
            .await?)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
