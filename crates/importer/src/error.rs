use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File '{file_name}' was already imported for client '{client_name}'")]
    DuplicateFile {
        file_name: String,
        client_name: String,
    },

    #[error("Cannot parse '{file_name}': {reason}")]
    Parse { file_name: String, reason: String },

    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error("Import batch not found: {0}")]
    BatchNotFound(String),

    #[error("Storage error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl ImportError {
    pub(crate) fn parse(file_name: &str, err: impl std::fmt::Display) -> Self {
        ImportError::Parse {
            file_name: file_name.to_string(),
            reason: format!("{:#}", err),
        }
    }
}
