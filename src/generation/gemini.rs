//! Gemini `generateContent` client.
//!
//! Sends the assembled envelope as a multi-part request with an explicit
//! response-schema constraint, so the endpoint is forced to return the
//! exact result shape the workflow persists. Credentials come exclusively
//! from caller-supplied configuration.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::generation::{CaseResult, GenerationClient, REQUIRED_RESULT_FIELDS};
use crate::knowledge::{EnvelopePart, RequestEnvelope};

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GenerationConfig,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: WireContent<'a>,
    contents: Vec<WireContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineBlob<'a>,
    },
}

#[derive(Debug, Serialize)]
struct InlineBlob<'a> {
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    /// Base64-encoded document bytes.
    data: String,
}

#[derive(Debug, Serialize)]
struct WireGenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// The schema constraint sent with every request: all result fields are
/// strings, `extractedPolicyNumber` is nullable, everything else required.
fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "analysis": { "type": "STRING" },
            "recommendation": { "type": "STRING" },
            "nextSteps": { "type": "STRING" },
            "replyEnglish": { "type": "STRING" },
            "replyGerman": { "type": "STRING" },
            "extractedClientName": { "type": "STRING" },
            "extractedPolicyNumber": {
                "type": "STRING",
                "nullable": true,
                "description": "The extracted policy number if found, otherwise null."
            }
        },
        "required": REQUIRED_RESULT_FIELDS,
    })
}

/// Models occasionally wrap JSON in a markdown fence despite the response
/// MIME constraint; strip it before parsing.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    else {
        return trimmed;
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(trimmed)
}

impl GeminiClient {
    /// Build a client from resolved configuration. A missing API key is
    /// reported at call time, not here, so the workspace can still be
    /// constructed and prompt for re-authentication on first use.
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GenerationError::from)?;
        Ok(Self { config, http })
    }

    fn build_body<'a>(&self, envelope: &'a RequestEnvelope) -> GenerateContentRequest<'a> {
        let parts = envelope
            .parts
            .iter()
            .map(|part| match part {
                EnvelopePart::Text(text) => WirePart::Text { text },
                EnvelopePart::Inline { mime_type, data } => WirePart::Inline {
                    inline_data: InlineBlob {
                        mime_type,
                        data: BASE64.encode(data),
                    },
                },
            })
            .collect();

        GenerateContentRequest {
            system_instruction: WireContent {
                parts: vec![WirePart::Text {
                    text: &envelope.system_instruction,
                }],
            },
            contents: vec![WireContent { parts }],
            generation_config: WireGenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, envelope: &RequestEnvelope) -> Result<CaseResult, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(GenerationError::MissingCredential)?;

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            api_key.expose_secret()
        );
        debug!(
            "sending generation request to {}",
            url.replace(api_key.expose_secret(), "***")
        );

        let body = self.build_body(envelope);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(GenerationError::from)?;

        let status = response.status();
        if matches!(status.as_u16(), 401 | 403 | 404) {
            return Err(GenerationError::Authentication {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::ResponseParse(err.to_string()))?;

        let text = payload
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.parts.as_slice())
            .unwrap_or_default()
            .iter()
            .find_map(|part| part.text.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        let value: Value = serde_json::from_str(strip_code_fence(text))
            .map_err(|err| GenerationError::ResponseParse(err.to_string()))?;
        CaseResult::from_json_value(value)
    }
}
