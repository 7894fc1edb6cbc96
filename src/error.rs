use std::fmt;

/// Fatal configuration problems, reported before any message is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No target names configured. Set TARGET_NAMES or TARGET_NAMES_JSON.")]
    NoTargetNames,

    #[error("{key} is not a JSON array of strings: {source}")]
    InvalidNameList {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Setup failures that stop the batch before any message is processed.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Error finding or creating {label} label: {source:#}")]
    Label {
        label: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Unable to retrieve messages: {0:#}")]
    Search(#[source] anyhow::Error),
}

/// Where a single message's pipeline stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Resolve,
    Apply,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Resolve => "resolve",
            Stage::Apply => "apply",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} failed for message {message_id}: {source:#}")]
pub struct MessageFailure {
    pub message_id: String,
    pub stage: Stage,
    #[source]
    pub source: anyhow::Error,
}

impl MessageFailure {
    pub fn new(message_id: &str, stage: Stage, source: anyhow::Error) -> Self {
        Self {
            message_id: message_id.to_string(),
            stage,
            source,
        }
    }
}
