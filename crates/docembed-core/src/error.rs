use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The input collection does not have the shape the component expects.
    #[error("{0}")]
    InputShape(String),

    #[error("The embedding model of {component} has not been loaded. Please call warm_up() before running.")]
    NotReady { component: &'static str },

    /// Raised by the embedding backend while embedding; passed through as-is.
    #[error(transparent)]
    Backend(anyhow::Error),

    #[error("Embedding backend returned {actual} vectors for {expected} texts")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Failed to load embedding backend for model '{model}'")]
    Load {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Secret resolution failed: {0}")]
    Secret(String),

    #[error("Invalid device: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_mentions_warm_up() {
        let err = Error::NotReady { component: "DocumentEmbedder" };
        let msg = err.to_string();
        assert!(msg.contains("DocumentEmbedder"));
        assert!(msg.contains("warm_up()"));
    }

    #[test]
    fn backend_error_is_transparent() {
        let err = Error::Backend(anyhow::anyhow!("CUDA out of memory"));
        assert_eq!(err.to_string(), "CUDA out of memory");
    }
}
