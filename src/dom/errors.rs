use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read style sheet {path}: {source}")]
    StyleSheet {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
