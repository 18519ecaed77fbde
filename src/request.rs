//! Request and response shapes at the API boundary

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::CaptureSummary;
use crate::{Error, Message, Result};

/// A transcript to render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    /// Messages in display order
    pub messages: Vec<Message>,
    /// Identity whose messages are drawn as the phone owner's
    pub current_user: String,
    /// Counterpart shown in the chat header
    pub contact_name: String,
    /// Accepted for compatibility; not used for layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl CaptureRequest {
    /// Parse and validate a raw JSON body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| Error::Validation(format!("Invalid JSON body: {}", e)))?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON value.
    ///
    /// All of `messages`, `currentUser` and `contactName` must be present and
    /// non-empty; `messages` must be an array (it may have no elements).
    pub fn from_value(value: Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::Validation("Request body must be a JSON object".into()))?;

        if ["messages", "currentUser", "contactName"]
            .iter()
            .any(|field| !is_present(obj.get(*field)))
        {
            return Err(Error::Validation("Missing required fields".into()));
        }

        if !obj.get("messages").map(Value::is_array).unwrap_or(false) {
            return Err(Error::Validation("Field 'messages' must be an array.".into()));
        }

        serde_json::from_value(value).map_err(|e| Error::Validation(format!("Malformed request: {}", e)))
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// JSON body returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub success: bool,
    pub message: String,
    /// Chunks actually written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_count: Option<usize>,
    /// Session directory holding the chunks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl CaptureResponse {
    pub fn success(summary: &CaptureSummary) -> Self {
        Self {
            success: true,
            message: format!("Generated {} screenshots", summary.chunk_count),
            chunk_count: Some(summary.chunk_count),
            planned_count: Some(summary.planned_count),
            location: Some(summary.location.display().to_string()),
        }
    }

    pub fn failure(err: &Error) -> Self {
        let message = match err {
            Error::Validation(_) | Error::Slice { .. } => err.to_string(),
            other => format!("Error generating screenshots: {}", other),
        };
        Self {
            success: false,
            message,
            chunk_count: None,
            planned_count: None,
            location: None,
        }
    }

    /// Build the response and HTTP status for a pipeline outcome.
    pub fn from_result(result: &Result<CaptureSummary>) -> (u16, Self) {
        match result {
            Ok(summary) => (200, Self::success(summary)),
            Err(e) => (e.status_code(), Self::failure(e)),
        }
    }
}
