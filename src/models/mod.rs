use crate::services::csv_parser::ParseError;
use crate::services::storage::UploadError;
use serde::Serialize;
use serde::ser::SerializeMap;

/// One data row of a CSV file, keyed by the header fields.
///
/// Fields keep header order and every value is a string; no type inference
/// is attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// Serialized as a JSON object whose keys follow header order.
impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Where an uploaded object ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub location: String,
    pub key: String,
    /// ETag or content hash reported by the store, if any.
    pub etag: Option<String>,
}

/// Terminal result of one ingestion request.
#[derive(Debug)]
pub enum PipelineOutcome {
    Success {
        records: Vec<Record>,
        upload: UploadResult,
    },
    ParseFailure {
        reason: ParseError,
    },
    UploadFailure {
        reason: UploadError,
    },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success { .. })
    }
}

/// Lifecycle of a single ingestion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Processing,
    Succeeded,
    Failed,
    Cleaned,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Received, Processing)
                | (Processing, Succeeded)
                | (Processing, Failed)
                | (Succeeded, Cleaned)
                | (Failed, Cleaned)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == PipelineState::Cleaned
    }
}
