use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app_config::AppConfig;
use crate::errors::UpstreamError;
use crate::fallback_content::fallback_records;
use crate::models::SlideRecord;
use crate::slide_normalizer::{normalize_deck, SlideRules};

/// A single-shot text generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

// Struct to hold the OpenRouter LLM response
#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    choices: Vec<OpenRouterChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterMessage,
}

#[derive(Debug, Deserialize)]
struct OpenRouterMessage {
    content: String,
}

/// Chat-completion client for OpenRouter or any OpenAI-compatible endpoint.
pub struct OpenRouterGenerator {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenRouterGenerator {
    pub fn new(config: &AppConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(config.generation_timeout()).build()?;

        Ok(Self {
            client,
            url: config.generation_url.clone(),
            api_key: config.openrouter_api_key.clone(),
            model: config.generation_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenRouterGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential("OPENROUTER_API_KEY"))?;

        // Create the request payload
        let payload = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                service: "OpenRouter",
                status: response.status().as_u16(),
            });
        }

        let response_body = response
            .json::<OpenRouterResponse>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        response_body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(UpstreamError::Empty("OpenRouter"))
    }
}

/// Produces the thirteen content slides for a pose.
///
/// One generation attempt is made; any failure returns the fallback deck.
#[derive(Clone)]
pub struct ContentProvider {
    generator: Arc<dyn TextGenerator>,
    config: Arc<AppConfig>,
}

impl ContentProvider {
    pub fn new(generator: Arc<dyn TextGenerator>, config: Arc<AppConfig>) -> Self {
        Self { generator, config }
    }

    pub fn rules(&self) -> &SlideRules {
        &self.config.slide_rules
    }

    pub async fn provide(&self, asana: &str, student_name: &str) -> Vec<SlideRecord> {
        info!(
            "Fetching structured slide content for {} (student: {})",
            asana,
            if student_name.is_empty() { "-" } else { student_name }
        );

        let prompt = self.config.render_prompt(asana);
        match self.generator.generate(&prompt).await {
            Ok(raw) => normalize_deck(&raw, asana, self.rules()),
            Err(e) => {
                warn!("Text generation failed for {}, using fallback content: {}", asana, e);
                fallback_records(asana, self.rules())
            }
        }
    }
}
