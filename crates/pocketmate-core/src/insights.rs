//! Generative-AI insight backend
//!
//! Two operations sit behind the `InsightBackend` trait: monthly narrative
//! insights for the report email, and receipt field extraction for
//! scan-assisted transaction entry. The production backend talks to a
//! Gemini-style `generateContent` HTTP API. Responses are parsed strictly -
//! anything that is not the expected shape is an error, and for insights the
//! caller substitutes a fixed fallback list so report generation never fails
//! on a flaky model.

use async_trait::async_trait;
use base64::Engine;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{MonthlyStats, ParsedReceipt};
use crate::stats::category_chart_data;

/// Upper bound on accepted insight list length
const MAX_INSIGHTS: usize = 8;
/// Upper bound on a single insight string
const MAX_INSIGHT_LEN: usize = 300;

/// Backend-agnostic interface to the generative-AI collaborator
#[async_trait]
pub trait InsightBackend: Send + Sync {
    /// Produce a short list of natural-language insights for a month
    async fn generate_insights(&self, stats: &MonthlyStats, month: &str) -> Result<Vec<String>>;

    /// Extract transaction fields from a receipt image
    async fn parse_receipt(&self, image: &[u8], mime_type: &str) -> Result<ParsedReceipt>;
}

/// Static insights used whenever the backend fails or misbehaves
pub fn fallback_insights() -> Vec<String> {
    vec![
        "Your highest expense category this month might need attention.".to_string(),
        "Consider setting up automatic savings to reach your financial goals.".to_string(),
        "Track your recurring expenses to identify potential savings opportunities.".to_string(),
        "Monitor your spending patterns to make informed financial decisions.".to_string(),
    ]
}

/// Gemini-style `generateContent` backend
pub struct GeminiClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables; None disables AI features
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").ok()?;
        let model = std::env::var("POCKETMATE_INSIGHT_MODEL")
            .unwrap_or_else(|_| "gemini-1.5-flash".to_string());
        let base_url = std::env::var("POCKETMATE_INSIGHT_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
        Some(Self::new(&base_url, &api_key, &model))
    }

    async fn generate(&self, parts: serde_json::Value) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "contents": [{ "parts": parts }] }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Insights(format!(
                "insight API returned {}",
                response.status()
            )));
        }

        let body: GenerateContentResponse = response.json().await?;
        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| Error::Insights("empty insight API response".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

fn insight_prompt(stats: &MonthlyStats, month: &str) -> String {
    let categories = category_chart_data(stats)
        .iter()
        .map(|s| format!("{}: ${:.2}", s.category, s.amount))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Analyze this financial data and provide 4 concise, actionable insights.\n\
         Focus on spending patterns, savings opportunities, and practical advice.\n\
         Keep it friendly and conversational.\n\n\
         Financial Data for {month}:\n\
         - Total Income: ${:.2}\n\
         - Total Expenses: ${:.2}\n\
         - Net Income: ${:.2}\n\
         - Savings Rate: {:.1}%\n\
         - Transaction Count: {}\n\
         - Expense Categories: {}\n\
         - Top Expense Category: {}\n\n\
         Format the response as a JSON array of strings, like this:\n\
         [\"insight 1\", \"insight 2\", \"insight 3\", \"insight 4\"]",
        stats.total_income,
        stats.total_expenses,
        stats.net_income,
        stats.savings_rate,
        stats.transaction_count,
        categories,
        stats.top_category,
    )
}

fn receipt_prompt() -> String {
    "Analyze this receipt image and extract the following information in JSON format:\n\
     - Total amount (just the number)\n\
     - Date (in ISO format YYYY-MM-DD)\n\
     - Description or items purchased (brief summary)\n\
     - Merchant/store name\n\
     - Suggested category (one of: housing, transportation, groceries, utilities, \
     entertainment, food, shopping, healthcare, education, personal, travel, insurance, \
     gifts, bills, other-expense)\n\n\
     Only respond with valid JSON in this exact format:\n\
     {\"amount\": number, \"date\": \"ISO date string\", \"description\": \"string\", \
     \"merchantName\": \"string\", \"category\": \"string\"}\n\n\
     If it's not a receipt, return an empty object."
        .to_string()
}

/// Strip markdown code fences the model tends to wrap JSON in
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Parse an insight response: must be a JSON array of short strings
pub(crate) fn parse_insight_response(text: &str) -> Result<Vec<String>> {
    let cleaned = strip_code_fences(text);
    let insights: Vec<String> = serde_json::from_str(cleaned)
        .map_err(|e| Error::Insights(format!("insight response is not a string list: {}", e)))?;

    if insights.is_empty() || insights.len() > MAX_INSIGHTS {
        return Err(Error::Insights(format!(
            "expected 1..={} insights, got {}",
            MAX_INSIGHTS,
            insights.len()
        )));
    }
    if let Some(oversized) = insights.iter().find(|i| i.len() > MAX_INSIGHT_LEN) {
        return Err(Error::Insights(format!(
            "insight exceeds {} chars: {:.40}...",
            MAX_INSIGHT_LEN, oversized
        )));
    }

    Ok(insights)
}

/// Parse a receipt response into typed fields with explicit defaults
pub(crate) fn parse_receipt_response(text: &str) -> Result<ParsedReceipt> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RawReceipt {
        #[serde(default)]
        amount: Option<f64>,
        #[serde(default)]
        date: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        merchant_name: Option<String>,
        #[serde(default)]
        category: Option<String>,
    }

    let cleaned = strip_code_fences(text);
    let raw: RawReceipt = serde_json::from_str(cleaned)
        .map_err(|e| Error::Insights(format!("receipt response is not an object: {}", e)))?;

    let amount = raw
        .amount
        .ok_or_else(|| Error::Insights("receipt response has no amount".to_string()))?;
    if !(amount > 0.0) {
        return Err(Error::Insights(format!(
            "receipt amount must be positive, got {}",
            amount
        )));
    }

    Ok(ParsedReceipt {
        amount,
        date: raw
            .date
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        description: raw.description,
        merchant_name: raw.merchant_name,
        category: raw.category,
    })
}

#[async_trait]
impl InsightBackend for GeminiClient {
    async fn generate_insights(&self, stats: &MonthlyStats, month: &str) -> Result<Vec<String>> {
        let text = self
            .generate(json!([{ "text": insight_prompt(stats, month) }]))
            .await?;
        debug!(month, "insight response received");
        parse_insight_response(&text)
    }

    async fn parse_receipt(&self, image: &[u8], mime_type: &str) -> Result<ParsedReceipt> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let text = self
            .generate(json!([
                { "text": receipt_prompt() },
                { "inline_data": { "mime_type": mime_type, "data": encoded } }
            ]))
            .await?;
        parse_receipt_response(&text)
    }
}

/// Test backend with scripted responses
#[derive(Default)]
pub struct MockInsights {
    pub insights: Option<Vec<String>>,
    pub receipt: Option<ParsedReceipt>,
    pub fail: bool,
}

#[async_trait]
impl InsightBackend for MockInsights {
    async fn generate_insights(&self, _stats: &MonthlyStats, _month: &str) -> Result<Vec<String>> {
        if self.fail {
            return Err(Error::Insights("mock insight backend set to fail".to_string()));
        }
        Ok(self
            .insights
            .clone()
            .unwrap_or_else(|| vec!["Mock insight".to_string()]))
    }

    async fn parse_receipt(&self, _image: &[u8], _mime_type: &str) -> Result<ParsedReceipt> {
        if self.fail {
            return Err(Error::Insights("mock insight backend set to fail".to_string()));
        }
        self.receipt
            .clone()
            .ok_or_else(|| Error::Insights("no scripted receipt".to_string()))
    }
}
