//! The Guardian content API client
//!
//! Fetches the latest headlines, optionally restricted to one section.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{get_json, missing_api_key};
use crate::fetch::{RemoteCall, RemoteError};

/// Base URL for the Guardian search endpoint
const GUARDIAN_BASE_URL: &str = "https://content.guardianapis.com/search";

/// Number of articles requested per fetch
const PAGE_SIZE: u32 = 12;

/// A single news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub section: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    /// Short teaser, if the API provided one
    pub summary: Option<String>,
}

/// Client for the Guardian API
#[derive(Debug, Clone)]
pub struct NewsClient {
    client: Client,
    api_key: Option<String>,
    section: Option<String>,
    base_url: String,
}

impl NewsClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            section: None,
            base_url: GUARDIAN_BASE_URL.to_string(),
        }
    }

    pub fn with_section(mut self, section: Option<String>) -> Self {
        self.section = section;
        self
    }

    /// Points the client at another server (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetches the latest articles, newest first
    pub async fn fetch_latest(&self) -> Result<Vec<Article>, RemoteError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing_api_key("Guardian"))?;

        let page_size = PAGE_SIZE.to_string();
        let mut query = vec![
            ("api-key", api_key),
            ("order-by", "newest"),
            ("show-fields", "trailText"),
            ("page-size", page_size.as_str()),
        ];
        if let Some(section) = self.section.as_deref() {
            query.push(("section", section));
        }

        let request = self.client.get(&self.base_url).query(&query);
        let response: GuardianResponse = get_json(request).await?;
        parse_response(response)
    }
}

#[async_trait]
impl RemoteCall for NewsClient {
    type Output = Vec<Article>;

    async fn call(&self) -> Result<Vec<Article>, RemoteError> {
        self.fetch_latest().await
    }
}

fn parse_response(response: GuardianResponse) -> Result<Vec<Article>, RemoteError> {
    let body = response.response;
    if body.status != "ok" {
        return Err(RemoteError::Malformed(format!(
            "unexpected response status '{}'",
            body.status
        )));
    }

    Ok(body
        .results
        .into_iter()
        .map(|result| Article {
            id: result.id,
            title: result.web_title,
            section: result.section_name,
            url: result.web_url,
            published_at: result.web_publication_date,
            summary: result
                .fields
                .and_then(|f| f.trail_text)
                .map(|t| strip_tags(&t))
                .filter(|t| !t.is_empty()),
        })
        .collect())
}

/// Removes HTML tags from the teaser text
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

#[derive(Debug, Deserialize)]
struct GuardianResponse {
    response: GuardianBody,
}

#[derive(Debug, Deserialize)]
struct GuardianBody {
    status: String,
    #[serde(default)]
    results: Vec<GuardianResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuardianResult {
    id: String,
    web_title: String,
    section_name: String,
    web_url: String,
    web_publication_date: DateTime<Utc>,
    fields: Option<GuardianFields>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuardianFields {
    trail_text: Option<String>,
}
