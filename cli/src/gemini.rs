use anyhow::{Context, Result};
use tracing::debug;

use morsel_core::gemini::{GenerateContentRequest, GenerateContentResponse};
use morsel_core::inference::{AnalysisResult, InferenceError, InferenceProvider};

use crate::config::InferenceConfig;

pub struct GeminiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    rt: tokio::runtime::Handle,
}

fn generate_url(endpoint: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model.trim()
    )
}

impl GeminiClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "morsel/{} (calorie tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(config.timeout())
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: generate_url(&config.endpoint, &config.model),
            api_key,
            rt: tokio::runtime::Handle::current(),
        })
    }

    pub async fn infer_async(&self, text: &str) -> Result<AnalysisResult, InferenceError> {
        let resp = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest::analyze(text))
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(InferenceError::Status(status.as_u16()));
        }

        let body: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| InferenceError::Parse(e.to_string()))?;
        let result = body.into_analysis()?;
        debug!(
            action = ?result.action_type,
            items = result.items().len(),
            "inference response"
        );
        Ok(result)
    }
}

impl InferenceProvider for GeminiClient {
    fn infer(&self, text: &str) -> Result<AnalysisResult, InferenceError> {
        tokio::task::block_in_place(|| self.rt.block_on(self.infer_async(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url() {
        assert_eq!(
            generate_url("https://example.test/v1beta/", " gemini-x "),
            "https://example.test/v1beta/models/gemini-x:generateContent"
        );
    }

    #[tokio::test]
    async fn test_new_requires_api_key() {
        let config = InferenceConfig::default();
        assert!(GeminiClient::new(&config).is_err());

        let config = InferenceConfig {
            api_key: Some("k".to_string()),
            ..InferenceConfig::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        assert!(client.url.ends_with(":generateContent"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreachable_endpoint_is_request_error() {
        let config = InferenceConfig {
            api_key: Some("k".to_string()),
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..InferenceConfig::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        let err = client.infer_async("apple").await.unwrap_err();
        assert!(matches!(err, InferenceError::Request(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "hits the Gemini API"]
    async fn test_live_food_analysis() {
        let config = crate::config::Settings::default()
            .with_env(|name| std::env::var(name).ok())
            .inference;
        let client = GeminiClient::new(&config).unwrap();
        let result = client.infer_async("one banana").await.unwrap();
        assert!(!result.items().is_empty());
    }
}
