//! Local port allocation.
//!
//! The OS picks a free port for a throwaway listener which is released
//! before ssh binds it. Another process can grab the port in between; ssh
//! then fails with `ExitOnForwardFailure` and the tunnel reports it.

use dbward_core::TunnelError;
use std::net::{Ipv4Addr, TcpListener};

/// Probe binds attempted before giving up
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 3;

/// Pick a currently free port on 127.0.0.1
pub fn allocate_local_port() -> Result<u16, TunnelError> {
    let mut last_error = None;
    for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).and_then(|l| l.local_addr()) {
            Ok(addr) if addr.port() != 0 => return Ok(addr.port()),
            Ok(_) => {
                tracing::debug!(attempt, "OS returned port 0, retrying");
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "Local port probe failed");
                last_error = Some(e);
            }
        }
    }
    Err(TunnelError::PortAllocation(last_error.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no port assigned")
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocated_port_is_bindable() {
        let port = allocate_local_port().unwrap();
        assert_ne!(port, 0);
        // Released again, so we can take it
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }
}
