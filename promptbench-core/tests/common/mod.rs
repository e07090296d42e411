//! Shared test utilities for integration tests

// Each test file includes this module separately, so not every helper is used
// in every compilation unit.
#![allow(dead_code)]

use promptbench_core::{LlmConfig, OpenAiClient};
use std::env;
use std::time::Duration;

/// API key for live tests, or `None` to skip them.
pub fn get_api_key() -> Option<String> {
    env::var("OPENAI_API_KEY").ok()
}

/// Client tuned for tests: short timeout, tiny answers, deterministic.
pub fn create_test_client(api_key: &str) -> OpenAiClient {
    let config = LlmConfig::default()
        .with_timeout(Duration::from_secs(30))
        .with_max_tokens(16)
        .with_temperature(0.0)
        .with_max_retries(1)
        .with_retry_delay(Duration::from_millis(500));
    OpenAiClient::new(api_key, config).expect("client should build")
}
