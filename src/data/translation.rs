//! MyMemory translation client
//!
//! Each distinct (text, target language) pair is its own cached resource, keyed
//! by a digest of the text so that long headlines make short, stable keys.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::http::get_json;
use crate::fetch::{RemoteCall, RemoteError};

/// Base URL for the MyMemory API
const MYMEMORY_BASE_URL: &str = "https://api.mymemory.translated.net/get";

/// Language the dashboard content is written in
const SOURCE_LANGUAGE: &str = "en";

/// A translated piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub source_text: String,
    pub translated_text: String,
    pub target: String,
}

/// Remote call translating one text into one language
#[derive(Debug, Clone)]
pub struct TranslationClient {
    client: Client,
    text: String,
    target: String,
    base_url: String,
}

impl TranslationClient {
    pub fn new(client: Client, text: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            client,
            text: text.into(),
            target: target.into(),
            base_url: MYMEMORY_BASE_URL.to_string(),
        }
    }

    /// Points the client at another server (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Cache key for this text and target, e.g. `translation-es-3f2a9c01d4e5b6a7`
    pub fn cache_key(&self) -> String {
        translation_cache_key(&self.text, &self.target)
    }

    pub async fn translate(&self) -> Result<Translation, RemoteError> {
        let langpair = format!("{}|{}", SOURCE_LANGUAGE, self.target);
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("q", self.text.as_str()), ("langpair", langpair.as_str())]);

        let response: MyMemoryResponse = get_json(request).await?;
        parse_response(&self.text, &self.target, response)
    }
}

#[async_trait]
impl RemoteCall for TranslationClient {
    type Output = Translation;

    async fn call(&self) -> Result<Translation, RemoteError> {
        self.translate().await
    }
}

/// Builds the cache key for a (text, target) pair
pub fn translation_cache_key(text: &str, target: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("translation-{}-{}", target, &hex::encode(digest)[..16])
}

fn parse_response(
    text: &str,
    target: &str,
    response: MyMemoryResponse,
) -> Result<Translation, RemoteError> {
    // responseStatus is a number on success but sometimes a string on errors
    let status = match &response.response_status {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    };
    if status != 200 {
        let message = response
            .response_details
            .unwrap_or_else(|| "translation failed".to_string());
        return Err(RemoteError::Status {
            status: if status == 0 { 502 } else { status },
            message,
        });
    }

    let translated_text = response.response_data.translated_text.trim().to_string();
    if translated_text.is_empty() {
        return Err(RemoteError::Malformed("empty translation".to_string()));
    }

    Ok(Translation {
        source_text: text.to_string(),
        translated_text,
        target: target.to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryResponse {
    response_data: ResponseData,
    response_status: Value,
    #[serde(default)]
    response_details: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    translated_text: String,
}
