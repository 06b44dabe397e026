use std::path::PathBuf;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("node {0} is not live")]
    UnknownNode(String),
}

impl GraphError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Why a children fetch did not produce a descriptor.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid node JSON in {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("fetch worker disconnected")]
    Disconnected,

    #[error("{0}")]
    Rejected(String),
}
