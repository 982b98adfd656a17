//! Knowledge payload assembly for one triage case.
//!
//! Turns the raw email input, the resolved history partition, and the agent
//! playbook into the multi-part envelope sent to the generation endpoint.
//! History is flattened into a textual digest (the model never sees the
//! structured records), and an empty partition renders an explicit sentinel
//! so "no history" is distinguishable from a malformed request.

use crate::error::CaseError;
use crate::history::{ClientId, InteractionRecord};
use crate::playbook::Playbook;

/// Digest line emitted when the client has no prior interactions.
pub const NO_HISTORY_SENTINEL: &str = "No previous interaction history found.";

/// The raw email being triaged. Exactly one input mode per case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseInput {
    /// A screenshot of the email.
    Screenshot { data: Vec<u8>, mime_type: String },
    /// The pasted email text.
    Text(String),
}

impl CaseInput {
    /// Convenience constructor for PNG screenshots, the common capture
    /// format.
    pub fn png_screenshot(data: Vec<u8>) -> Self {
        Self::Screenshot {
            data,
            mime_type: "image/png".to_string(),
        }
    }
}

/// One part of the outbound request payload, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopePart {
    Text(String),
    /// Binary attachment (email screenshot or policy handbook).
    Inline { mime_type: String, data: Vec<u8> },
}

/// The assembled multi-part request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// System instruction embedding the playbook rules verbatim.
    pub system_instruction: String,
    pub parts: Vec<EnvelopePart>,
}

/// Validate the case input before any state transition or network call.
///
/// Rejects an absent input, and text input that is empty or
/// whitespace-only. Returns the validated input so callers can proceed
/// without re-matching.
pub fn validate_input(input: Option<&CaseInput>) -> Result<&CaseInput, CaseError> {
    match input {
        None => Err(CaseError::InvalidInput(
            "No email input selected. Upload a screenshot or paste the email text.".to_string(),
        )),
        Some(CaseInput::Screenshot { data, .. }) if data.is_empty() => Err(
            CaseError::InvalidInput("Please upload an email screenshot.".to_string()),
        ),
        Some(CaseInput::Text(text)) if text.trim().is_empty() => Err(CaseError::InvalidInput(
            "Please paste the email text.".to_string(),
        )),
        Some(input) => Ok(input),
    }
}

/// Flatten a history partition into the chronological-descending digest the
/// model receives. Never empty: an empty partition yields the sentinel.
pub fn history_digest(history: &[InteractionRecord]) -> String {
    if history.is_empty() {
        return NO_HISTORY_SENTINEL.to_string();
    }
    history
        .iter()
        .map(|record| {
            format!(
                "[Date: {}] [Policy: {}] Summary: {}",
                record.date,
                record.policy_number.as_deref().unwrap_or("Unknown"),
                record.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn system_instruction(rules: &str) -> String {
    format!(
        r#"Role: You are an expert Insurance Agent Assistant.
Objective: Analyze the provided email (either text or screenshot), extract core data, and draft bilingual replies.

Task 1: Structured Extraction
- Extract the Client's Full Name.
- Extract the Policy Number (usually a string of numbers/letters).
- Identify the core request and emotional tone.

Task 2: Policy Handling
- IMPORTANT: If a Policy Number is NOT found in the input, you MUST include a polite request asking the client to provide their policy number for faster processing in both language drafts.
- If multiple policies are mentioned, address the primary one but acknowledge the others.

Task 3: Memory Integration
- Use STORED MEMORY to reference past issues. Note that clients may have multiple insurance types (Home, Car, Liability).

Task 4: Response Generation
- Provide the internal analysis, a recommendation, and concrete next steps.
- Draft professional, empathetic replies in English (replyEnglish) and German (replyGerman).
- Follow the AGENT PLAYBOOK. If a policy handbook document is attached, treat it as the authoritative reference.

AGENT PLAYBOOK:
{rules}
"#
    )
}

fn case_prompt(client: Option<&ClientId>, history: &[InteractionRecord]) -> String {
    format!(
        "CLIENT ID PROVIDED BY AGENT: {}\nSTORED MEMORY:\n{}\n\nAnalyze the attached input (Text/Image) and return the analysis and drafts in JSON.",
        client
            .map(ClientId::as_str)
            .unwrap_or("Not provided (Please extract from input)"),
        history_digest(history)
    )
}

/// Assemble the request envelope for one case.
///
/// Part order: case prompt, then the email input (screenshot attachment or
/// text block), then the policy handbook attachment when one is configured.
pub fn assemble(
    input: Option<&CaseInput>,
    client: Option<&ClientId>,
    history: &[InteractionRecord],
    playbook: &Playbook,
) -> Result<RequestEnvelope, CaseError> {
    let input = validate_input(input)?;

    let mut parts = vec![EnvelopePart::Text(case_prompt(client, history))];
    match input {
        CaseInput::Screenshot { data, mime_type } => parts.push(EnvelopePart::Inline {
            mime_type: mime_type.clone(),
            data: data.clone(),
        }),
        CaseInput::Text(text) => {
            parts.push(EnvelopePart::Text(format!("EMAIL TEXT CONTENT: \n{text}")));
        }
    }
    if let Some(handbook) = &playbook.handbook {
        parts.push(EnvelopePart::Inline {
            mime_type: handbook.mime_type.clone(),
            data: handbook.data.clone(),
        });
    }

    Ok(RequestEnvelope {
        system_instruction: system_instruction(&playbook.rules_text),
        parts,
    })
}
