use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One transcribed speech fragment bound for the collector.
///
/// The relay only interprets `id` (for queue reconciliation); every other
/// field is forwarded to the collector as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Producer-assigned identifier, unique within a session; never reassigned
    pub id: String,
    /// Transcribed text
    pub text: String,
    /// Speaker label, if diarization provided one
    pub speaker: Option<String>,
    /// Language tag (ISO 639-1)
    pub language: Option<String>,
    /// Timestamp when the fragment was captured
    pub timestamp: DateTime<Utc>,
    /// Session or meeting identifier
    pub session_id: Option<String>,
}

impl Record {
    /// Create a new record with a freshly minted id
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            speaker: None,
            language: None,
            timestamp: Utc::now(),
            session_id: None,
        }
    }

    /// Create a record with a caller-supplied id
    pub fn with_id(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            speaker: None,
            language: None,
            timestamp: Utc::now(),
            session_id: None,
        }
    }

    pub fn speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Wire body for `POST /voicedata/batch`: `{ "data": [...], "count": N }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEnvelope {
    pub data: Vec<Record>,
    pub count: usize,
}

impl BatchEnvelope {
    /// Wrap an ordered batch; `count` is always derived from the data
    pub fn new(data: Vec<Record>) -> Self {
        let count = data.len();
        Self { data, count }
    }
}

/// Result of a single delivery attempt.
///
/// Every attempt produces exactly one outcome; a network-level failure and a
/// non-2xx status both classify as `Failed` because the collector protocol
/// does not distinguish retryable from permanent rejections.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// Collector acknowledged with a 2xx status
    Delivered {
        /// Response body, possibly empty
        response: String,
    },
    /// Network failure or non-2xx status
    Failed {
        /// Human-readable failure detail
        error: String,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Caller-facing outcome of a coordinator operation.
///
/// `message` is suitable for direct status display; `pending` is the queue
/// backlog after the operation completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    /// Records confirmed delivered by this call
    pub delivered: usize,
    /// Records still awaiting delivery
    pub pending: usize,
}

impl SyncReport {
    pub fn ok(message: impl Into<String>, delivered: usize, pending: usize) -> Self {
        Self {
            success: true,
            message: message.into(),
            delivered,
            pending,
        }
    }

    pub fn failed(message: impl Into<String>, pending: usize) -> Self {
        Self {
            success: false,
            message: message.into(),
            delivered: 0,
            pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_field_names() {
        let record = Record::with_id("r-1", "hello")
            .speaker("alice")
            .language("en")
            .session("meeting-42");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], "r-1");
        assert_eq!(value["text"], "hello");
        assert_eq!(value["speaker"], "alice");
        assert_eq!(value["language"], "en");
        assert_eq!(value["session_id"], "meeting-42");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_batch_envelope_count_matches_data() {
        let batch = BatchEnvelope::new(vec![Record::new("a"), Record::new("b")]);
        assert_eq!(batch.count, 2);

        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_record_roundtrip_preserves_id() {
        let record = Record::new("fragment");
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.text, "fragment");
    }

    #[test]
    fn test_outcome_classification() {
        let ok = DeliveryOutcome::Delivered {
            response: String::new(),
        };
        let bad = DeliveryOutcome::Failed {
            error: "HTTP 500".to_string(),
        };
        assert!(ok.is_delivered());
        assert!(!bad.is_delivered());
    }
}
