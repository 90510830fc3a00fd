//! # AI Price Generation
//!
//! Asks an LLM provider for the current car catalog. Gemini is called through
//! its REST `generateContent` endpoint; DeepSeek and OpenAI share the chat
//! completions format.
//!
//! The provider is told to answer with JSON only, but answers wrapped in
//! markdown fences are tolerated, and both `{ "cars": { ... } }` and a bare
//! brand map are accepted.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{AiEndpoints, EnvApiKeys};
use crate::errors::AiError;
use crate::models::CarDatabase;
use crate::settings::{AiSource, AppSettings};

lazy_static! {
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$").expect("Fence pattern should be valid");
}

/// Gemini request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

/// Chat completions request body (DeepSeek, OpenAI)
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Accepted shapes of the provider's JSON answer
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceResponse {
    Wrapped { cars: CarDatabase },
    Bare(CarDatabase),
}

/// Client for the configured AI providers
pub struct AiClient {
    http: Client,
    endpoints: AiEndpoints,
    env_keys: EnvApiKeys,
}

impl AiClient {
    pub fn new(endpoints: AiEndpoints, env_keys: EnvApiKeys) -> Result<Self, AiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(endpoints.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoints,
            env_keys,
        })
    }

    /// Key for the selected source: stored settings first, then environment
    fn resolve_key<'a>(&'a self, settings: &'a AppSettings) -> Option<&'a str> {
        let stored = settings.api_key(settings.ai_source).trim();
        let env = match settings.ai_source {
            AiSource::Gemini => self.env_keys.gemini.trim(),
            AiSource::DeepSeek => self.env_keys.deepseek.trim(),
            AiSource::OpenAi => self.env_keys.openai.trim(),
        };
        [stored, env].into_iter().find(|key| !key.is_empty())
    }

    /// Whether the selected source has a usable key
    pub fn has_key(&self, settings: &AppSettings) -> bool {
        self.resolve_key(settings).is_some()
    }

    /// Generate a fresh car catalog, using `reference` as the current state
    /// of the market
    pub async fn generate_prices(
        &self,
        settings: &AppSettings,
        reference: &CarDatabase,
    ) -> Result<CarDatabase, AiError> {
        if settings.ai_kill_switch {
            return Err(AiError::KillSwitch);
        }
        let key = self
            .resolve_key(settings)
            .ok_or(AiError::MissingApiKey(settings.ai_source))?;
        let prompt = build_prompt(reference);

        info!(source = %settings.ai_source, "Requesting prices from AI provider");
        let text = match settings.ai_source {
            AiSource::Gemini => self.gemini(key, &prompt).await?,
            AiSource::DeepSeek => {
                self.chat_completion(
                    &self.endpoints.deepseek_base_url,
                    &self.endpoints.deepseek_model,
                    key,
                    &prompt,
                )
                .await?
            }
            AiSource::OpenAi => {
                self.chat_completion(
                    &self.endpoints.openai_base_url,
                    &self.endpoints.openai_model,
                    key,
                    &prompt,
                )
                .await?
            }
        };
        debug!(chars = text.len(), "AI provider answered");

        let cars = parse_price_response(&text)?;
        info!(
            source = %settings.ai_source,
            brands = cars.brands.len(),
            variants = cars.variant_count(),
            "AI prices generated"
        );
        Ok(cars)
    }

    async fn gemini(&self, key: &str, prompt: &str) -> Result<String, AiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoints.gemini_base_url.trim_end_matches('/'),
            self.endpoints.gemini_model
        );
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: GeminiResponse = response.json().await?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }

    async fn chat_completion(
        &self,
        base_url: &str,
        model: &str,
        key: &str,
        prompt: &str,
    ) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: ChatResponse = response.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "AI provider returned an error status");
    Err(AiError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fences(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// Parse the provider's text into a car catalog
pub fn parse_price_response(text: &str) -> Result<CarDatabase, AiError> {
    let json = strip_code_fences(text);
    if json.is_empty() {
        return Err(AiError::EmptyResponse);
    }
    let mut cars = match serde_json::from_str::<PriceResponse>(json) {
        Ok(PriceResponse::Wrapped { cars }) | Ok(PriceResponse::Bare(cars)) => cars,
        // Surface the serde error of the documented shape
        Err(_) => serde_json::from_str::<CarDatabase>(json)?,
    };
    cars.fill_brand_names();
    if cars.is_empty() {
        return Err(AiError::NoPrices);
    }
    Ok(cars)
}

/// The instruction sent to every provider
pub fn build_prompt(reference: &CarDatabase) -> String {
    let mut prompt = String::from(
        "Generate a JSON object of current Iranian car prices (in Millions of Tomans).\n\
         Structure: { \"cars\": { \"Brand\": { \"name\": \"Brand\", \"models\": [ { \"name\": \"Model Name\", \
         \"variants\": [ { \"name\": \"Variant Name\", \"marketPrice\": 1234, \"factoryPrice\": 1000 } ] } ] } } }\n\
         Include popular brands: Iran Khodro, Saipa, Pars Khodro, Bahman Motor, Kerman Motor.\n",
    );
    if !reference.is_empty() {
        if let Ok(json) = serde_json::to_string(reference) {
            prompt.push_str("Use this current catalog as a reference and keep its names:\n");
            prompt.push_str(&json);
            prompt.push('\n');
        }
    }
    prompt.push_str("Return ONLY JSON.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_wrapped_and_bare() {
        let wrapped = r#"{"cars":{"Saipa":{"models":[{"name":"Shahin","variants":[{"name":"G","marketPrice":980,"factoryPrice":720}]}]}}}"#;
        let cars = parse_price_response(wrapped).unwrap();
        assert_eq!(cars.brands["Saipa"].name, "Saipa");

        let bare = r#"{"Saipa":{"name":"Saipa","models":[]}}"#;
        let cars = parse_price_response(bare).unwrap();
        assert!(cars.brands.contains_key("Saipa"));
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_price_response("   "), Err(AiError::EmptyResponse)));
        assert!(matches!(parse_price_response("{}"), Err(AiError::NoPrices)));
        assert!(matches!(
            parse_price_response(r#"{"cars":{}}"#),
            Err(AiError::NoPrices)
        ));
        assert!(matches!(
            parse_price_response("prices are up"),
            Err(AiError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_prompt_mentions_reference() {
        let empty = build_prompt(&CarDatabase::default());
        assert!(empty.contains("Iran Khodro"));
        assert!(!empty.contains("reference"));

        let mut reference = CarDatabase::default();
        reference.upsert_variant("Saipa", "Quick", crate::models::CarVariant::new("R", 500.0, 400.0));
        assert!(build_prompt(&reference).contains("\"Quick\""));
    }

    #[test]
    fn test_key_resolution_prefers_settings() {
        let client = AiClient::new(
            AiEndpoints::default(),
            EnvApiKeys {
                gemini: "env-key".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        let mut settings = AppSettings::default();
        assert_eq!(client.resolve_key(&settings), Some("env-key"));

        settings.gemini_api_key = "stored".to_string();
        assert_eq!(client.resolve_key(&settings), Some("stored"));

        settings.ai_source = AiSource::OpenAi;
        assert!(!client.has_key(&settings));
    }
}
