use anyhow::{anyhow, Context, Result};
use models::{AnalysisSettings, LookerCreativeData};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are a performance marketing analyst. Given an ad creative and \
its context, describe the format, the hook, the offer and the call to action, then list what \
to keep and what to test next. Answer in plain text.";

/// Anything able to turn one creative plus a context string into an
/// analysis text.
pub trait CreativeAnalyzer {
    fn analyze(&self, creative: &LookerCreativeData, context: &str) -> Result<String>;
}

/// Endpoint settings for [`AnalysisClient`].
#[derive(Debug, Clone)]
pub struct AnalysisClientConfig {
    pub base_url: String,
    pub model: String,
}

impl AnalysisClientConfig {
    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
        }
    }
}

/// Chat-style analysis endpoint over blocking HTTP.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    http: Client,
    base_url: Url,
    model: String,
}

impl AnalysisClient {
    pub fn new(config: AnalysisClientConfig) -> Result<Self> {
        let base_url = validate_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            model: config.model,
        })
    }

    /// Single-turn chat call.
    pub fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let endpoint = self
            .base_url
            .join("api/chat")
            .context("Failed to build /api/chat URL")?;

        let request = ChatRequest {
            model: self.model.clone(),
            stream: false,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            options: Some(ChatOptions {
                temperature: Some(0.2),
            }),
        };

        let response: ChatResponse = self
            .http
            .post(endpoint.clone())
            .json(&request)
            .send()
            .with_context(|| format!("POST {endpoint} failed"))?
            .error_for_status()
            .with_context(|| format!("POST {endpoint} returned non-success status"))?
            .json()
            .with_context(|| format!("Failed to parse JSON response from {endpoint}"))?;

        let content = response
            .message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("Analysis response had no message content"))?;

        Ok(content.trim().to_string())
    }
}

impl CreativeAnalyzer for AnalysisClient {
    fn analyze(&self, creative: &LookerCreativeData, context: &str) -> Result<String> {
        self.chat(SYSTEM_PROMPT, &creative_prompt(creative, context))
    }
}

fn creative_prompt(creative: &LookerCreativeData, context: &str) -> String {
    let mut prompt = format!("Ad name: {}\n", creative.ad_name);
    if let Some(url) = &creative.image_url {
        prompt.push_str(&format!("Creative URL: {url}\n"));
    }
    if let Some(link) = &creative.ad_preview_link {
        prompt.push_str(&format!("Preview: {link}\n"));
    }
    if let Some(desc) = &creative.creative_description {
        prompt.push_str(&format!("Copy: {desc}\n"));
    }
    if !context.trim().is_empty() {
        prompt.push_str(&format!("Context: {}\n", context.trim()));
    }
    prompt
}

fn validate_base_url(base_url: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).with_context(|| format!("Invalid analysis base URL: {base_url}"))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(anyhow!(
                "Unsupported scheme '{other}' for analysis base URL (use http or https)"
            ))
        }
    }
    if url.host_str().is_none() {
        return Err(anyhow!("Analysis base URL is missing a host"));
    }

    // Url::join drops the last path segment unless it ends with '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisFailure {
    pub ad_name: String,
    pub error: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BulkAnalysisReport {
    pub analyzed: Vec<String>,
    /// No creative link, no image, or already analysed.
    pub skipped: Vec<String>,
    pub failed: Vec<AnalysisFailure>,
}

impl BulkAnalysisReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Analyses every ad in `ad_names` that has a linked image and stores the
/// text in its `analysis_result`. A failing ad is recorded and the run
/// continues with the next one.
pub fn run_bulk_analysis(
    analyzer: &dyn CreativeAnalyzer,
    links: &mut BTreeMap<String, LookerCreativeData>,
    ad_names: &[String],
    context: &str,
    overwrite: bool,
) -> BulkAnalysisReport {
    let mut report = BulkAnalysisReport::default();

    for name in ad_names {
        let Some(creative) = links.get_mut(name) else {
            report.skipped.push(name.clone());
            continue;
        };
        if !creative.has_image() || (creative.analysis_result.is_some() && !overwrite) {
            report.skipped.push(name.clone());
            continue;
        }

        match analyzer.analyze(creative, context) {
            Ok(text) => {
                creative.analysis_result = Some(text);
                report.analyzed.push(name.clone());
            }
            Err(err) => {
                warn!(ad_name = %name, error = %err, "creative analysis failed");
                report.failed.push(AnalysisFailure {
                    ad_name: name.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
    }

    info!(
        analyzed = report.analyzed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "bulk analysis finished"
    );
    report
}
