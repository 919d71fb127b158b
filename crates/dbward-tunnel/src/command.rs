//! ssh command lines for forwarding and one-shot remote commands.

use crate::auth::PreparedAuth;
use dbward_core::{SshDescriptor, SshSettings, escape};
use std::process::Stdio;
use tokio::process::Command;

/// Loopback address every forward listens on
pub const LOCAL_HOST: &str = "127.0.0.1";

/// A fully built ssh process description
#[derive(Debug, Clone)]
pub struct SshInvocation {
    program: String,
    args: Vec<String>,
    env: Vec<(String, dbward_core::SecretString)>,
}

impl SshInvocation {
    /// `ssh -N -L 127.0.0.1:<local>:<remote_host>:<remote_port> ...`
    pub fn forward(
        ssh: &SshDescriptor,
        settings: &SshSettings,
        auth: &PreparedAuth,
        local_port: u16,
        remote_host: &str,
        remote_port: u16,
    ) -> Self {
        let mut args = vec!["-N".to_string()];
        args.extend(common_options(settings));
        args.extend([
            "-o".to_string(),
            "ExitOnForwardFailure=yes".to_string(),
            "-L".to_string(),
            format!("{}:{}:{}:{}", LOCAL_HOST, local_port, remote_host, remote_port),
        ]);
        Self::finish(ssh, settings, auth, args, None)
    }

    /// `ssh ... user@host <command>` with no forwarding
    pub fn remote_command(
        ssh: &SshDescriptor,
        settings: &SshSettings,
        auth: &PreparedAuth,
        command: &str,
    ) -> Self {
        let args = common_options(settings);
        Self::finish(ssh, settings, auth, args, Some(command))
    }

    fn finish(
        ssh: &SshDescriptor,
        settings: &SshSettings,
        auth: &PreparedAuth,
        mut args: Vec<String>,
        remote_command: Option<&str>,
    ) -> Self {
        args.extend(auth.args.iter().cloned());
        args.extend(["-p".to_string(), ssh.port.to_string(), ssh.destination()]);
        if let Some(command) = remote_command {
            args.push(command.to_string());
        }

        let program = if auth.use_sshpass {
            args.insert(0, settings.binary.clone());
            args.insert(0, "-e".to_string());
            settings.sshpass_binary.clone()
        } else {
            settings.binary.clone()
        };

        Self {
            program,
            args,
            env: auth.env.clone(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Names of the environment variables set on the child
    pub fn env_names(&self) -> Vec<&str> {
        self.env.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Shell-style rendering for logs. Secrets live in the environment, so
    /// this never contains them.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(escape)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Detached child: own process group, null stdin and stdout, piped
    /// stderr, killed when the handle drops
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (name, value) in &self.env {
            cmd.env(name, value.expose());
        }
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

fn common_options(settings: &SshSettings) -> Vec<String> {
    [
        "StrictHostKeyChecking=no".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        format!("ConnectTimeout={}", settings.connect_timeout_secs),
        format!("ServerAliveInterval={}", settings.keepalive_interval_secs),
    ]
    .into_iter()
    .flat_map(|opt| ["-o".to_string(), opt])
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbward_core::SshAuth;

    fn descriptor(auth: SshAuth) -> SshDescriptor {
        SshDescriptor::new("bastion.example.com", "deploy", auth).with_port(2222)
    }

    #[test]
    fn test_forward_with_password() {
        let settings = SshSettings::default();
        let ssh = descriptor(SshAuth::password("pa55"));
        let auth = PreparedAuth::prepare(&ssh.auth, &settings).unwrap();
        let inv = SshInvocation::forward(&ssh, &settings, &auth, 40001, "10.0.0.5", 5432);

        assert_eq!(inv.program(), "sshpass");
        assert_eq!(&inv.args()[..3], &["-e", "ssh", "-N"]);
        let rendered = inv.display();
        assert!(rendered.contains("'-L' '127.0.0.1:40001:10.0.0.5:5432'"));
        assert!(rendered.contains("'ExitOnForwardFailure=yes'"));
        assert!(rendered.contains("'StrictHostKeyChecking=no'"));
        assert!(rendered.contains("'UserKnownHostsFile=/dev/null'"));
        assert!(rendered.contains("'ConnectTimeout=10'"));
        assert!(rendered.contains("'ServerAliveInterval=30'"));
        assert!(rendered.ends_with("'-p' '2222' 'deploy@bastion.example.com'"));
        assert!(!rendered.contains("pa55"));
        assert_eq!(inv.env_names(), vec!["SSHPASS"]);
    }

    #[test]
    fn test_key_auth_runs_ssh_directly() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SshSettings {
            temp_dir: Some(dir.path().to_path_buf()),
            ..SshSettings::default()
        };
        let ssh = descriptor(SshAuth::key("KEY"));
        let auth = PreparedAuth::prepare(&ssh.auth, &settings).unwrap();
        let inv = SshInvocation::remote_command(&ssh, &settings, &auth, "exit 0");

        assert_eq!(inv.program(), "ssh");
        assert!(!inv.args().contains(&"-N".to_string()));
        assert!(inv.args().contains(&"-i".to_string()));
        assert_eq!(inv.args().last().map(String::as_str), Some("exit 0"));
        assert!(!inv.display().contains("KEY\n"));
    }
}
