//! SSH port forwarding errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TunnelError {
    /// The tunnel never became ready; `message` is sanitized ssh stderr
    #[error("SSH tunnel failed: {message}")]
    SshTunnelFailed { message: String },

    #[error("Could not allocate a local port: {0}")]
    PortAllocation(#[source] std::io::Error),

    /// Writing the key file or askpass script failed
    #[error("Failed to prepare SSH credentials: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("Failed to start '{program}': {io}")]
    Spawn {
        program: String,
        #[source]
        io: std::io::Error,
    },

    /// `establish` called on a tunnel that is not idle
    #[error("Tunnel is {state}, expected idle")]
    InvalidState { state: String },
}

impl TunnelError {
    pub fn failed(message: impl Into<String>) -> Self {
        TunnelError::SshTunnelFailed {
            message: message.into(),
        }
    }
}
