//! Chat export loading.
//!
//! A chat export is a JSON array of message objects. Only three fields are
//! read; everything else in the export is ignored:
//!
//! ```json
//! [{ "created_at": "2022-04-15T18:00:00Z",
//!    "commenter": { "_id": "1234" },
//!    "message": { "body": "buy now" } }]
//! ```
//!
//! Missing fields are kept as `None` so the event store can reject the
//! batch with the index of the offending message.

use std::path::Path;

use chatvote_types::RawChatEvent;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ReplayError;

#[derive(Debug, Deserialize)]
struct ExportMessage {
    created_at: Option<DateTime<Utc>>,
    commenter: Option<Commenter>,
    message: Option<MessageBody>,
}

#[derive(Debug, Deserialize)]
struct Commenter {
    #[serde(rename = "_id")]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    body: Option<String>,
}

impl From<ExportMessage> for RawChatEvent {
    fn from(message: ExportMessage) -> Self {
        Self {
            timestamp: message.created_at,
            actor_id: message.commenter.and_then(|c| c.id),
            body: message.message.and_then(|m| m.body),
        }
    }
}

/// Parse a chat export held in memory.
///
/// # Errors
///
/// Returns a JSON error if the text is not an array of message objects.
pub fn parse_export(json: &str) -> Result<Vec<RawChatEvent>, serde_json::Error> {
    let messages: Vec<ExportMessage> = serde_json::from_str(json)?;
    Ok(messages.into_iter().map(RawChatEvent::from).collect())
}

/// Read and parse the chat export at `path`.
///
/// # Errors
///
/// Returns [`ReplayError::Input`] if the file cannot be read and
/// [`ReplayError::Export`] if it cannot be parsed.
pub fn load_export(path: &Path) -> Result<Vec<RawChatEvent>, ReplayError> {
    let json = std::fs::read_to_string(path).map_err(|source| ReplayError::Input {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_export(&json)?)
}
