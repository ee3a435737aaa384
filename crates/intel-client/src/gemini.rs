use serde::{Deserialize, Serialize};

use crate::error::{IntelError, IntelResult};
use crate::IntelConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    fn new(system: Option<&str>, prompt: &str, json_mode: bool) -> Self {
        Self {
            contents: vec![Content::text(Some("user"), prompt)],
            system_instruction: system.map(|s| Content::text(None, s)),
            generation_config: json_mode.then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> IntelResult<String> {
        let candidate = self.candidates.first().ok_or(IntelError::EmptyResponse)?;
        let text: String = candidate
            .content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            tracing::debug!(
                "Candidate carried no text (finish reason: {:?})",
                candidate.finish_reason
            );
            return Err(IntelError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &IntelConfig) -> IntelResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| IntelError::NotConfigured("GEMINI_API_KEY not set".into()))?;

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single generation request. No retries; a timeout surfaces as
    /// [`IntelError::Timeout`].
    pub async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        json_mode: bool,
    ) -> IntelResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateContentRequest::new(system, prompt, json_mode);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntelError::ServiceUnavailable(format!(
                "Status: {} {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IntelError::Timeout
                } else {
                    IntelError::InvalidResponse(e.to_string())
                }
            })?;

        body.text()
    }
}

fn transport_error(e: reqwest::Error) -> IntelError {
    if e.is_timeout() {
        IntelError::Timeout
    } else {
        IntelError::RequestFailed(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_request_shape() {
        let request = GenerateContentRequest::new(Some("be terse"), "hello", true);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be terse");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );

        let plain = serde_json::to_value(GenerateContentRequest::new(None, "hi", false)).unwrap();
        assert!(plain.get("systemInstruction").is_none());
        assert!(plain.get("generationConfig").is_none());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body = r#"{"candidates": [{"content": {"role": "model", "parts": [
            {"text": "{\"periods\": "}, {"text": "[]}"}
        ]}, "finishReason": "STOP"}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.text().unwrap(), "{\"periods\": []}");
    }

    #[test]
    fn test_response_without_text_is_empty() {
        let resp: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(resp.text(), Err(IntelError::EmptyResponse)));

        let blocked = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(blocked).unwrap();
        assert!(matches!(resp.text(), Err(IntelError::EmptyResponse)));
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = GeminiClient::new(&IntelConfig::default()).err().unwrap();
        assert!(matches!(err, IntelError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let config = IntelConfig {
            api_key: Some("test-key".into()),
            base_url: "http://127.0.0.1:9/".into(),
            timeout: Duration::from_secs(2),
            ..IntelConfig::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        assert!(client.generate(None, "ping", false).await.is_err());
    }
}
