//! Structured generation for triage cases.
//!
//! [`GenerationClient`] is the seam to the external model endpoint: an
//! assembled envelope goes out, a [`CaseResult`] matching the fixed
//! response schema comes back, and every failure mode maps to a typed
//! [`GenerationError`](crate::error::GenerationError). The only shipped
//! implementation is [`GeminiClient`].

mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GenerationError;
use crate::knowledge::RequestEnvelope;

/// Fields the endpoint must return, in wire (camelCase) spelling.
pub(crate) const REQUIRED_RESULT_FIELDS: [&str; 6] = [
    "analysis",
    "recommendation",
    "nextSteps",
    "replyEnglish",
    "replyGerman",
    "extractedClientName",
];

/// The structured outcome of one generation call.
///
/// Transient: held in memory for the duration of one case and folded into
/// an [`InteractionRecord`](crate::history::InteractionRecord) on persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub analysis: String,
    pub recommendation: String,
    pub next_steps: String,
    pub reply_english: String,
    pub reply_german: String,
    pub extracted_client_name: String,
    #[serde(default)]
    pub extracted_policy_number: Option<String>,
}

impl CaseResult {
    /// Decode an already-parsed JSON payload, reporting the first missing
    /// or mistyped required field by name.
    pub(crate) fn from_json_value(value: Value) -> Result<Self, GenerationError> {
        let Some(map) = value.as_object() else {
            return Err(GenerationError::ResponseParse(
                "expected a JSON object".to_string(),
            ));
        };

        for field in REQUIRED_RESULT_FIELDS {
            if !map.get(field).is_some_and(Value::is_string) {
                return Err(GenerationError::MalformedResponse { field });
            }
        }
        if let Some(policy) = map.get("extractedPolicyNumber")
            && !policy.is_null()
            && !policy.is_string()
        {
            return Err(GenerationError::MalformedResponse {
                field: "extractedPolicyNumber",
            });
        }

        serde_json::from_value(value)
            .map_err(|err| GenerationError::ResponseParse(err.to_string()))
    }
}

/// Invokes the external generation endpoint with an assembled envelope.
///
/// No side effects beyond the outbound call; implementations never touch
/// the history store.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, envelope: &RequestEnvelope) -> Result<CaseResult, GenerationError>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn full_payload() -> Value {
        json!({
            "analysis": "Client reports a move.",
            "recommendation": "Update the address on all policies.",
            "nextSteps": "Confirm effective date.",
            "replyEnglish": "Dear Jane...",
            "replyGerman": "Liebe Jane...",
            "extractedClientName": "Jane Doe",
            "extractedPolicyNumber": null
        })
    }

    #[test]
    fn full_payload_decodes_with_null_policy_number() {
        let result = CaseResult::from_json_value(full_payload()).expect("decode");
        assert_eq!(result.extracted_client_name, "Jane Doe");
        assert_eq!(result.extracted_policy_number, None);
        assert_eq!(result.next_steps, "Confirm effective date.");
    }

    #[test]
    fn missing_required_field_is_reported_by_name() {
        let mut payload = full_payload();
        payload.as_object_mut().expect("object").remove("replyGerman");

        let err = CaseResult::from_json_value(payload).expect_err("must fail");
        assert_eq!(
            err,
            GenerationError::MalformedResponse {
                field: "replyGerman"
            }
        );
    }

    #[test]
    fn mistyped_required_field_is_reported_by_name() {
        let mut payload = full_payload();
        payload["analysis"] = json!(42);

        let err = CaseResult::from_json_value(payload).expect_err("must fail");
        assert_eq!(err, GenerationError::MalformedResponse { field: "analysis" });
    }

    #[test]
    fn absent_policy_number_key_decodes_as_none() {
        let mut payload = full_payload();
        payload
            .as_object_mut()
            .expect("object")
            .remove("extractedPolicyNumber");

        let result = CaseResult::from_json_value(payload).expect("decode");
        assert_eq!(result.extracted_policy_number, None);
    }

    #[test]
    fn present_policy_number_is_kept() {
        let mut payload = full_payload();
        payload["extractedPolicyNumber"] = json!("HH-4711");

        let result = CaseResult::from_json_value(payload).expect("decode");
        assert_eq!(result.extracted_policy_number.as_deref(), Some("HH-4711"));
    }

    #[test]
    fn non_object_payload_is_a_parse_error() {
        let err = CaseResult::from_json_value(json!(["not", "an", "object"]))
            .expect_err("must fail");
        assert!(matches!(err, GenerationError::ResponseParse(_)));
    }
}
