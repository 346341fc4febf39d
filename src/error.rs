use thiserror::Error;

/// The single hard error surface the core raises.
///
/// Everything else (transient network failures, malformed decodes, loss of
/// robot code while enabled) is absorbed into observable state rather than
/// propagated to a caller.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("adapter fms_hz must be positive, got {0}")]
    NonPositiveFmsHz(i64),

    #[error("adapter robot_hz must be positive, got {0}")]
    NonPositiveRobotHz(i64),

    #[error("adapter scanner_count must be at least 1, got {0}")]
    ZeroScannerCount(u32),

    #[error("adapter reported an empty extra-ip list where a non-empty one was expected")]
    EmptyExtraIps,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Wraps adapter-installation failures together with the socket-bind I/O
/// errors that can occur while constructing a `ProtocolCore` — the only two
/// ways `ProtocolCore::new` can fail.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind protocol sockets: {0}")]
    Io(#[from] std::io::Error),
}

