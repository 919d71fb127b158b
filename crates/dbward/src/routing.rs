//! Sending engine commands through the connection's SSH bastion.

use dbward_core::{ConnectionDescriptor, DbwardResult, OperationLogger};
use dbward_engines::EngineCommands;
use dbward_tunnel::SshTunnel;

/// Open the tunnel `connection` needs, if any, and point `commands` at its
/// local endpoint. Connections without a bastion pass through untouched.
///
/// The tunnel is left open on success; the caller closes it on every path.
pub async fn route_through_tunnel(
    connection: &ConnectionDescriptor,
    tunnel: &mut SshTunnel,
    commands: EngineCommands,
    logger: &dyn OperationLogger,
) -> DbwardResult<EngineCommands> {
    let Some(ssh) = connection.ssh.as_ref().filter(|_| connection.requires_tunnel()) else {
        return Ok(commands);
    };

    let endpoint = tunnel
        .establish(ssh, &connection.host, connection.effective_port(), logger)
        .await?;
    tracing::debug!(
        remote = %connection.host,
        local_port = endpoint.port,
        "Engine commands routed through tunnel"
    );
    let target = commands
        .target()
        .clone()
        .with_endpoint(endpoint.host, endpoint.port);
    Ok(commands.retarget(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbward_core::{
        DbwardError, EngineKind, EngineSettings, MemoryLogger, SshAuth, SshDescriptor,
        SshSettings,
    };
    use dbward_engines::{EngineRegistry, EngineTarget};
    use dbward_tunnel::TunnelState;

    fn commands_for(connection: &ConnectionDescriptor) -> EngineCommands {
        EngineRegistry::with_defaults(&EngineSettings::default())
            .commands_for(EngineTarget::from_connection(connection, "app"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_direct_connection_is_untouched() {
        let connection = ConnectionDescriptor::new(EngineKind::PostgreSql, "db.internal");
        let mut tunnel = SshTunnel::new(SshSettings::default());

        let routed = route_through_tunnel(
            &connection,
            &mut tunnel,
            commands_for(&connection),
            &MemoryLogger::new(),
        )
        .await
        .unwrap();
        assert_eq!(routed.target().host, "db.internal");
        assert_eq!(routed.target().port, 5432);
        assert_eq!(tunnel.state(), TunnelState::Idle);
    }

    #[tokio::test]
    async fn test_local_file_engine_never_tunnels() {
        let connection = ConnectionDescriptor::new(EngineKind::Sqlite, "").with_ssh(
            SshDescriptor::new("bastion", "deploy", SshAuth::password("pw")),
        );
        let mut tunnel = SshTunnel::new(SshSettings {
            binary: "/nonexistent/ssh".to_string(),
            ..SshSettings::default()
        });

        let routed = route_through_tunnel(
            &connection,
            &mut tunnel,
            commands_for(&connection),
            &MemoryLogger::new(),
        )
        .await;
        assert!(routed.is_ok());
        assert_eq!(tunnel.state(), TunnelState::Idle);
    }

    #[tokio::test]
    async fn test_tunnel_failure_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let connection = ConnectionDescriptor::new(EngineKind::MySql, "10.0.0.9").with_ssh(
            SshDescriptor::new("bastion", "deploy", SshAuth::key("KEY")),
        );
        let mut tunnel = SshTunnel::new(SshSettings {
            binary: dir.path().join("missing-ssh").to_string_lossy().into_owned(),
            temp_dir: Some(dir.path().to_path_buf()),
            ..SshSettings::default()
        });

        let err = route_through_tunnel(
            &connection,
            &mut tunnel,
            commands_for(&connection),
            &MemoryLogger::new(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, DbwardError::Tunnel(_)));
        assert_eq!(tunnel.state(), TunnelState::Idle);
    }
}
