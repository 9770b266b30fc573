use crate::models::{PipelineOutcome, PipelineState};
use crate::services::csv_parser::parse_file;
use crate::services::staging::StagedFile;
use crate::services::storage::{ObjectStore, object_key};
use std::sync::Arc;

/// Runs parse and upload over one staged file, then releases it.
#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn ObjectStore>,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Parses and uploads `staged` concurrently and waits for both to finish
    /// before the file is released. The staged file is gone when this
    /// returns, whatever the outcome.
    ///
    /// If both operations fail the parse failure is reported.
    pub async fn run(&self, mut staged: StagedFile) -> PipelineOutcome {
        let mut state = Tracker::new(staged.original_filename());
        let key = object_key(staged.original_filename());

        state.advance(PipelineState::Processing);
        let (parsed, uploaded) = tokio::join!(
            parse_file(staged.path()),
            self.store.put_file(&key, staged.path()),
        );

        let outcome = match (parsed, uploaded) {
            (Ok(records), Ok(upload)) => {
                tracing::info!(
                    "✅ Ingested {} ({} records, {} bytes) to {}",
                    staged.original_filename(),
                    records.len(),
                    staged.size(),
                    upload.location
                );
                PipelineOutcome::Success { records, upload }
            }
            (Err(reason), _) => {
                tracing::debug!("Failed to parse {}: {}", staged.original_filename(), reason);
                PipelineOutcome::ParseFailure { reason }
            }
            (Ok(_), Err(reason)) => {
                tracing::debug!("Failed to upload {} to {}: {}", staged.original_filename(), key, reason);
                PipelineOutcome::UploadFailure { reason }
            }
        };

        state.advance(if outcome.is_success() {
            PipelineState::Succeeded
        } else {
            PipelineState::Failed
        });

        staged.release().await;
        state.advance(PipelineState::Cleaned);

        outcome
    }
}

struct Tracker {
    filename: String,
    current: PipelineState,
}

impl Tracker {
    fn new(filename: &str) -> Self {
        tracing::debug!(file = filename, state = ?PipelineState::Received, "pipeline state");
        Self {
            filename: filename.to_string(),
            current: PipelineState::Received,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.current.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.current,
            next
        );
        tracing::debug!(file = %self.filename, state = ?next, "pipeline state");
        self.current = next;
    }
}
