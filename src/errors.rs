pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error in file \"{file}\": {source}")]
    FileIo {
        file: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Error parsing \"{string}\" in \"{context}\": {reason}")]
    Parse {
        string: String,
        context: String,
        reason: &'static str,
    },
    #[error("Field \"{0}\" is not present in the dataset")]
    FieldNotFound(String),
    #[error("Unexpected payload for field \"{field}\": {reason}")]
    Format { field: String, reason: String },
    #[error("Cannot filter field \"{field}\": {reason}")]
    Filter { field: String, reason: String },
    #[error("Dataset \"{dir}\" was not written: {reason}")]
    Materialize { dir: String, reason: String },
}

impl Error {
    pub fn filter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Filter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
