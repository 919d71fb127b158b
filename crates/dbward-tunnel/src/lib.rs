//! # dbward Tunnel
//!
//! Reaches database servers that only listen on a private network by
//! forwarding a local port through an SSH bastion with the system `ssh`
//! client.
//!
//! ```rust,no_run
//! use dbward_core::{SshAuth, SshDescriptor, SshSettings, TracingLogger};
//! use dbward_tunnel::SshTunnel;
//!
//! # async fn run() -> Result<(), dbward_core::TunnelError> {
//! let bastion = SshDescriptor::new("bastion.example.com", "deploy", SshAuth::password("pw"));
//! let mut tunnel = SshTunnel::new(SshSettings::default());
//! let endpoint = tunnel.establish(&bastion, "10.0.3.7", 5432, &TracingLogger).await?;
//! println!("postgres reachable at {}:{}", endpoint.host, endpoint.port);
//! tunnel.close().await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod command;
pub mod port;
pub mod probe;
pub mod tunnel;

pub use auth::PreparedAuth;
pub use command::{LOCAL_HOST, SshInvocation};
pub use port::allocate_local_port;
pub use probe::test_ssh_connection;
pub use tunnel::{SshTunnel, TunnelEndpoint, TunnelState};
