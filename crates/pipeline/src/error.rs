use warden_core::error::CoreError;
use warden_core::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Fetch failed for {id}: {source}")]
    Fetch {
        id: EntityId,
        #[source]
        source: CoreError,
    },

    #[error("Classifier failed: {0}")]
    Classifier(String),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Affiliation recorder has shut down")]
    RecorderClosed,
}

impl PipelineError {
    /// Whether the affected IDs should be carried into the next batch.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Fetch { source, .. } => source.is_recoverable(),
            PipelineError::Classifier(_) | PipelineError::Store(_) => true,
            PipelineError::Core(e) => e.is_recoverable(),
            PipelineError::RecorderClosed => false,
        }
    }
}
