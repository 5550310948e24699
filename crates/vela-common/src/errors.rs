use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,

    #[error("session input queue is full")]
    QueueFull,

    #[error("session capacity reached ({0} live sessions)")]
    CapacityExhausted(usize),

    #[error("unknown session: {0}")]
    UnknownSession(String),
}

#[derive(Debug, thiserror::Error)]
pub enum VelaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("memory error: {0}")]
    Memory(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ValidationError("empty trigger table".into());
        assert_eq!(
            err.to_string(),
            "config validation error: empty trigger table"
        );
    }

    #[test]
    fn session_error_display() {
        let err = SessionError::CapacityExhausted(64);
        assert_eq!(err.to_string(), "session capacity reached (64 live sessions)");

        let err = SessionError::UnknownSession("abc".into());
        assert_eq!(err.to_string(), "unknown session: abc");
    }

    #[test]
    fn vela_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: VelaError = config_err.into();
        assert!(matches!(err, VelaError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn vela_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: VelaError = io_err.into();
        assert!(matches!(err, VelaError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn vela_error_plain_variants() {
        let err = VelaError::Memory("graph unreachable".into());
        assert_eq!(err.to_string(), "memory error: graph unreachable");

        let err = VelaError::Generation("backend unavailable".into());
        assert_eq!(err.to_string(), "generation error: backend unavailable");

        let err = VelaError::Other("something went wrong".into());
        assert_eq!(err.to_string(), "something went wrong");
    }
}
