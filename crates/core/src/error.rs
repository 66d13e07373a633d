use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("invalid contribution: {0}")]
    Validation(#[from] ValidationError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read story file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write story file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize relay notification: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to send relay datagram: {0}")]
    Relay(std::io::Error),

    /// The contribution was committed but the relay failed and policy says the
    /// request should fail. `story` is the committed text.
    #[error("contribution committed but relay failed: {source}")]
    RelayFailed {
        story: String,
        #[source]
        source: Box<StoryError>,
    },
}

impl StoryError {
    /// True for errors raised before any state was touched by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoryError::Validation(_) | StoryError::InvalidInput(_) | StoryError::InvalidDate(_)
        )
    }
}

pub type StoryResult<T> = std::result::Result<T, StoryError>;
