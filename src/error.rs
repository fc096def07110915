use thiserror::Error;

#[derive(Error, Debug)]
pub enum KharchaError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// The event source could not be read. The sync pass is aborted and the
    /// checkpoint is left where it was.
    #[error("Could not read event batch at offset {offset}: {source}")]
    BatchRead {
        offset: usize,
        #[source]
        source: Box<KharchaError>,
    },

    #[error("Could not store transaction {id}: {source}")]
    Persist {
        id: String,
        #[source]
        source: Box<KharchaError>,
    },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("No rule with ID {0}")]
    UnknownRule(i64),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl KharchaError {
    /// Whether retrying the same operation later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BatchRead { .. } | Self::Persist { .. })
    }
}

pub type Result<T> = std::result::Result<T, KharchaError>;
