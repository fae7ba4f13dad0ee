use thiserror::Error;

/// Whether a failed fetch may be tried again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Permanent,
    Transient,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("#{item} access denied")]
    AccessDenied { item: u64 },
    #[error("#{item} server returned {status} code")]
    Status { item: u64, status: u16 },
    #[error("#{item} request timed out")]
    Timeout { item: u64 },
    #[error("#{item} network error: {source}")]
    Network {
        item: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("#{item} server returned invalid response")]
    Malformed { item: u64 },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::AccessDenied { .. } => FailureKind::Permanent,
            _ => FailureKind::Transient,
        }
    }

    pub(crate) fn from_reqwest(item: u64, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout { item }
        } else {
            FetchError::Network { item, source }
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("list parsing error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("list endpoint returned {0} code")]
    Status(u16),
    #[error("collection {0} is access restricted")]
    AccessRestricted(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("poller task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required configuration value `{0}` is missing")]
    Missing(&'static str),
    #[error("configuration value `{0}` must be greater than zero")]
    Zero(&'static str),
    #[error("invalid endpoint url `{0}`: {1}")]
    Url(String, #[source] url::ParseError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
