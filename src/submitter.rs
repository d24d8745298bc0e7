//! Hand-off of solved puzzles to the external signing/broadcast tool.

use std::process::Stdio;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::SubmitError;
use crate::identity::Identity;

pub const DEFAULT_SUBMITTER_COMMAND: &str = "node testSubmitter.js";
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// One solved puzzle, ready to be signed and broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub nonce: u64,
    pub round_id: u64,
    pub bid_value: U256,
    pub contract_address: Address,
    pub identity: Identity,
}

impl SubmissionRequest {
    /// `nonce roundId bidValue contractAddress publicAddress credential`
    pub fn arguments(&self) -> Vec<String> {
        vec![
            self.nonce.to_string(),
            self.round_id.to_string(),
            self.bid_value.to_string(),
            format!("{:#x}", self.contract_address),
            format!("{:#x}", self.identity.address),
            self.identity.credential.expose().to_string(),
        ]
    }
}

#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<(), SubmitError>;
}

/// Runs an external program with the request as trailing arguments;
/// the exit status is the outcome.
#[derive(Debug, Clone)]
pub struct CommandSubmitter {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
}

impl CommandSubmitter {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
            timeout: SUBMIT_TIMEOUT,
        }
    }

    /// Split a whitespace-separated command line such as `node submit.js`.
    /// Returns `None` when it is empty.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Submitter for CommandSubmitter {
    async fn submit(&self, request: &SubmissionRequest) -> Result<(), SubmitError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .args(request.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| SubmitError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SubmitError::TimedOut(self.timeout))?
            .map_err(|source| SubmitError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(
            target: "miner::submitter",
            stdout = %stdout.trim(),
            stderr = %stderr.trim(),
            "Submitter output"
        );

        if output.status.success() {
            info!(
                target: "miner::submitter",
                nonce = request.nonce,
                round = request.round_id,
                bid = %request.bid_value,
                "Submission accepted by submitter"
            );
            Ok(())
        } else {
            Err(SubmitError::Failed(output.status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentitySet;
    use alloy_primitives::address;

    fn request() -> SubmissionRequest {
        let identities = IdentitySet::builtin().unwrap();
        SubmissionRequest {
            nonce: 4_242_424,
            round_id: 7,
            bid_value: U256::from(9970u64),
            contract_address: address!("3333333333333333333333333333333333333333"),
            identity: identities.get(2).unwrap().clone(),
        }
    }

    #[test]
    fn test_argument_order() {
        assert_eq!(
            request().arguments(),
            [
                "4242424",
                "7",
                "9970",
                "0x3333333333333333333333333333333333333333",
                "0xb9dd5afd86547df817da2d0fb89334a6f8edd891",
                "d13dc98a245bd29193d5b41203a1d3a4ae564257d60e00d6f68d120ef6b796c5",
            ]
        );
    }

    #[test]
    fn test_debug_hides_credential() {
        assert!(!format!("{:?}", request()).contains("d13dc98a"));
    }

    #[test]
    fn test_command_line_parsing() {
        let submitter = CommandSubmitter::from_command_line(DEFAULT_SUBMITTER_COMMAND).unwrap();
        assert_eq!(submitter.program(), "node");
        assert_eq!(submitter.base_args, ["testSubmitter.js"]);
        assert!(CommandSubmitter::from_command_line("   ").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_is_outcome() {
        let ok = CommandSubmitter::new("true", Vec::new());
        assert!(ok.submit(&request()).await.is_ok());

        let failing = CommandSubmitter::new("false", Vec::new());
        assert!(matches!(
            failing.submit(&request()).await,
            Err(SubmitError::Failed(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_program() {
        let submitter = CommandSubmitter::new("/nonexistent/submitter", Vec::new());
        assert!(matches!(
            submitter.submit(&request()).await,
            Err(SubmitError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_reach_program() {
        let script = r#"[ "$#" -eq 6 ] && [ "$1" = 4242424 ] && [ "$2" = 7 ] && [ "$3" = 9970 ]"#;
        let submitter = CommandSubmitter::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "submit".to_string()],
        );
        assert!(submitter.submit(&request()).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_submitter_times_out() {
        let submitter = CommandSubmitter::new("sh", vec!["-c".to_string(), "sleep 5".to_string()])
            .with_timeout(Duration::from_millis(100));
        assert!(matches!(
            submitter.submit(&request()).await,
            Err(SubmitError::TimedOut(_))
        ));
    }
}
