//! `ipset` subprocess admitter.
//!
//! Every admission is a fresh, short-lived child process:
//! `ipset add <set> -exist <addr> [timeout <seconds>]`.
//! The child is bounded by a timeout (and killed when it expires), and a
//! semaphore caps how many run at once so a hung or slow tool cannot exhaust
//! the host.

use crate::admission::Admitter;
use crate::config::PunchConfig;
use crate::PunchError;
use async_trait::async_trait;
use std::net::IpAddr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Build the ipset arguments for one admission.
///
/// A zero timeout is omitted, like an absent one.
pub fn ipset_add_args(set_name: &str, addr: IpAddr, timeout: Option<u64>) -> Vec<String> {
    let mut args = vec![
        "add".to_string(),
        set_name.to_string(),
        "-exist".to_string(),
        addr.to_string(),
    ];

    if let Some(seconds) = timeout.filter(|t| *t > 0) {
        args.push("timeout".to_string());
        args.push(seconds.to_string());
    }

    args
}

/// Admitter invoking the `ipset` binary.
pub struct IpsetAdmitter {
    program: String,
    leading_args: Vec<String>,
    command_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl IpsetAdmitter {
    /// Create an admitter from the command, timeout and concurrency settings in `config`.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configured command is empty.
    pub fn from_config(config: &PunchConfig) -> Result<Self, PunchError> {
        let (program, leading_args) = config
            .ipset_command
            .split_first()
            .ok_or_else(|| PunchError::ConfigError("ipset_command cannot be empty".to_string()))?;

        Ok(Self::new(
            program.clone(),
            leading_args.to_vec(),
            config.command_timeout,
            config.max_concurrent_admissions,
        ))
    }

    /// Create an admitter running `program leading_args.. add ...`.
    pub fn new(
        program: impl Into<String>,
        leading_args: Vec<String>,
        command_timeout: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args,
            command_timeout,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Number of admissions that could start right now without waiting.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl Admitter for IpsetAdmitter {
    async fn admit(
        &self,
        set_name: &str,
        addr: IpAddr,
        set_timeout: Option<u64>,
    ) -> Result<(), PunchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PunchError::AdmissionSpawn("admission slots closed".to_string()))?;

        let args = ipset_add_args(set_name, addr, set_timeout);
        debug!(program = %self.program, ?args, "Running packet-filter command");

        let child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PunchError::AdmissionSpawn(format!("{}: {}", self.program, e)))?;

        // On timeout the wait future is dropped with the child, which kills it.
        match timeout(self.command_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    program = %self.program,
                    code = ?output.status.code(),
                    stderr = %stderr.trim(),
                    "Packet-filter command exited with failure"
                );
                Err(PunchError::AdmissionFailed {
                    code: output.status.code(),
                })
            }
            Ok(Err(e)) => Err(PunchError::AdmissionSpawn(format!(
                "failed to wait for {}: {}",
                self.program, e
            ))),
            Err(_) => {
                warn!(
                    program = %self.program,
                    timeout = ?self.command_timeout,
                    "Packet-filter command timed out"
                );
                Err(PunchError::AdmissionTimeout {
                    timeout: self.command_timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    fn addr() -> IpAddr {
        "203.0.113.5".parse().unwrap()
    }

    /// Admitter running `sh <script>` so the script needs no exec bit.
    fn scripted(dir: &TempDir, body: &str, command_timeout: Duration) -> IpsetAdmitter {
        let script = dir.path().join("fake-ipset.sh");
        fs::write(&script, body).unwrap();
        IpsetAdmitter::new(
            "sh",
            vec![script.to_string_lossy().into_owned()],
            command_timeout,
            4,
        )
    }

    #[test]
    fn test_args_without_timeout() {
        assert_eq!(
            ipset_add_args("vault-allow", addr(), None),
            vec!["add", "vault-allow", "-exist", "203.0.113.5"]
        );
    }

    #[test]
    fn test_args_with_timeout() {
        assert_eq!(
            ipset_add_args("vault-allow", addr(), Some(300)),
            vec!["add", "vault-allow", "-exist", "203.0.113.5", "timeout", "300"]
        );
    }

    #[test]
    fn test_args_zero_timeout_omitted() {
        assert_eq!(
            ipset_add_args("vault-allow", addr(), Some(0)),
            vec!["add", "vault-allow", "-exist", "203.0.113.5"]
        );
    }

    #[test]
    fn test_args_ipv6() {
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(ipset_add_args("v6-allow", v6, None)[3], "2001:db8::1");
    }

    #[test]
    fn test_from_config_splits_command() {
        let config = PunchConfig {
            ipset_command: vec!["sudo".to_string(), "-n".to_string(), "ipset".to_string()],
            max_concurrent_admissions: 3,
            ..PunchConfig::default()
        };
        let admitter = IpsetAdmitter::from_config(&config).unwrap();
        assert_eq!(admitter.program, "sudo");
        assert_eq!(admitter.leading_args, vec!["-n", "ipset"]);
        assert_eq!(admitter.available_slots(), 3);
    }

    #[test]
    fn test_from_config_empty_command() {
        let config = PunchConfig {
            ipset_command: vec![],
            ..PunchConfig::default()
        };
        assert!(matches!(
            IpsetAdmitter::from_config(&config),
            Err(PunchError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_passes_exact_argv() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("argv.txt");
        let admitter = scripted(
            &dir,
            &format!("printf '%s\\n' \"$@\" > '{}'\n", out.display()),
            Duration::from_secs(10),
        );

        admitter.admit("vault-allow", addr(), Some(60)).await.unwrap();

        let argv = fs::read_to_string(&out).unwrap();
        assert_eq!(argv, "add\nvault-allow\n-exist\n203.0.113.5\ntimeout\n60\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let dir = TempDir::new().unwrap();
        let admitter = scripted(
            &dir,
            "echo \"ipset v7.1: The set with the given name does not exist\" >&2\nexit 1\n",
            Duration::from_secs(10),
        );

        let result = admitter.admit("vault-allow", addr(), None).await;
        assert!(matches!(result, Err(PunchError::AdmissionFailed { code: Some(1) })));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let admitter = IpsetAdmitter::new(
            "/nonexistent/punchgate-ipset",
            vec![],
            Duration::from_secs(1),
            1,
        );
        let result = admitter.admit("vault-allow", addr(), None).await;
        assert!(matches!(result, Err(PunchError::AdmissionSpawn(_))));
    }

    #[tokio::test]
    async fn test_hung_tool_times_out() {
        let dir = TempDir::new().unwrap();
        let admitter = scripted(&dir, "sleep 30\n", Duration::from_millis(200));

        let started = Instant::now();
        let result = admitter.admit("vault-allow", addr(), None).await;
        assert!(matches!(result, Err(PunchError::AdmissionTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_slot_released_after_admission() {
        let dir = TempDir::new().unwrap();
        let admitter = scripted(&dir, "exit 0\n", Duration::from_secs(10));

        admitter.admit("vault-allow", addr(), None).await.unwrap();
        let _ = admitter.admit("vault-allow", addr(), None).await;
        assert_eq!(admitter.available_slots(), 4);
    }
}
