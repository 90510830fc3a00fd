//! # AI Provider Tests
//!
//! Runs the AI client against wiremock servers standing in for Gemini and
//! the chat completions providers.

use anyhow::Result;
use serde_json::json;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricebot::ai::AiClient;
use pricebot::config::{AiEndpoints, EnvApiKeys};
use pricebot::errors::AiError;
use pricebot::models::CarDatabase;
use pricebot::settings::{AiSource, AppSettings};

const CATALOG: &str = r#"{"cars":{"Saipa":{"name":"Saipa","models":[{"name":"Shahin","variants":[{"name":"G","marketPrice":980,"factoryPrice":720}]}]}}}"#;

fn endpoints(server: &MockServer) -> AiEndpoints {
    AiEndpoints {
        gemini_base_url: server.uri(),
        deepseek_base_url: server.uri(),
        openai_base_url: format!("{}/v1", server.uri()),
        timeout_secs: 5,
        ..AiEndpoints::default()
    }
}

fn settings(source: AiSource) -> AppSettings {
    AppSettings {
        ai_source: source,
        gemini_api_key: "gemini-key".to_string(),
        deepseek_api_key: "deepseek-key".to_string(),
        openai_api_key: "openai-key".to_string(),
        ..AppSettings::default()
    }
}

fn chat_answer(content: &str) -> serde_json::Value {
    json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
}

#[tokio::test]
async fn test_gemini_generate_content() -> Result<()> {
    let server = MockServer::start().await;
    let model = AiEndpoints::default().gemini_model;
    Mock::given(method("POST"))
        .and(path(format!("/v1beta/models/{model}:generateContent")))
        .and(query_param("key", "gemini-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [ { "content": { "parts": [ { "text": CATALOG } ] } } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AiClient::new(endpoints(&server), EnvApiKeys::default())?;
    let cars = client
        .generate_prices(&settings(AiSource::Gemini), &CarDatabase::default())
        .await?;

    assert_eq!(cars.variant_count(), 1);
    assert_eq!(cars.brands["Saipa"].models[0].variants[0].market_price, 980.0);
    Ok(())
}

#[tokio::test]
async fn test_openai_answer_in_code_fence() -> Result<()> {
    let server = MockServer::start().await;
    let fenced = format!("```json\n{CATALOG}\n```");
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(bearer_token("openai-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer(&fenced)))
        .expect(1)
        .mount(&server)
        .await;

    let client = AiClient::new(endpoints(&server), EnvApiKeys::default())?;
    let cars = client
        .generate_prices(&settings(AiSource::OpenAi), &CarDatabase::default())
        .await?;
    assert!(cars.brands.contains_key("Saipa"));
    Ok(())
}

#[tokio::test]
async fn test_deepseek_uses_environment_key() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("env-deepseek"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer(
            r#"{"Bahman":{"models":[{"name":"Fidelity","variants":[]}]}}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let env_keys = EnvApiKeys {
        deepseek: "env-deepseek".to_string(),
        ..EnvApiKeys::default()
    };
    let client = AiClient::new(endpoints(&server), env_keys)?;
    let settings = AppSettings {
        ai_source: AiSource::DeepSeek,
        ..AppSettings::default()
    };
    assert!(client.has_key(&settings));

    let cars = client
        .generate_prices(&settings, &CarDatabase::default())
        .await?;
    assert_eq!(cars.brands["Bahman"].name, "Bahman");
    Ok(())
}

#[tokio::test]
async fn test_provider_error_status() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = AiClient::new(endpoints(&server), EnvApiKeys::default())?;
    let result = client
        .generate_prices(&settings(AiSource::OpenAi), &CarDatabase::default())
        .await;

    match result {
        Err(AiError::Api { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_empty_and_unparsable_answers() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer("Prices went up.")))
        .mount(&server)
        .await;

    let client = AiClient::new(endpoints(&server), EnvApiKeys::default())?;
    let reference = CarDatabase::default();

    let empty = client
        .generate_prices(&settings(AiSource::DeepSeek), &reference)
        .await;
    assert!(matches!(empty, Err(AiError::EmptyResponse)));

    let prose = client
        .generate_prices(&settings(AiSource::OpenAi), &reference)
        .await;
    assert!(matches!(prose, Err(AiError::InvalidJson(_))));
    Ok(())
}

#[tokio::test]
async fn test_guards_skip_the_network() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = AiClient::new(endpoints(&server), EnvApiKeys::default())?;

    let mut blocked = settings(AiSource::Gemini);
    blocked.ai_kill_switch = true;
    let result = client.generate_prices(&blocked, &CarDatabase::default()).await;
    assert!(matches!(result, Err(AiError::KillSwitch)));

    let keyless = AppSettings::default();
    let result = client.generate_prices(&keyless, &CarDatabase::default()).await;
    assert!(matches!(
        result,
        Err(AiError::MissingApiKey(AiSource::Gemini))
    ));
    Ok(())
}
