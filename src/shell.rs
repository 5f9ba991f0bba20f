use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::Result;

/// The capability of executing one command on a remote host.
///
/// A single call covers the whole lifecycle of one invocation: the command
/// is started, fed the provided `stdin`, its stdout and stderr are copied
/// into the provided sinks while it runs, and its exit code is returned once
/// it terminates. Implementations keep no state between calls.
#[async_trait]
pub trait Shell {
    /// Execute `command` on the remote host and return its exit code.
    async fn exec(
        &self,
        command: &str,
        stdin: &mut (dyn AsyncRead + Send + Unpin),
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u32>;

    /// Execute `command` with empty stdin and capture both output streams
    /// in memory.
    async fn output(&self, command: &str) -> Result<Output> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let status = self
            .exec(command, &mut tokio::io::empty(), &mut stdout, &mut stderr)
            .await?;
        Ok(Output {
            status,
            stdout,
            stderr,
        })
    }
}

/// The captured result of a completed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub status: u32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Output {
    /// Returns true if the command exited with code 0.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_exit_zero() {
        let ok = Output {
            status: 0,
            stdout: b"fine".to_vec(),
            stderr: Vec::new(),
        };
        assert!(ok.success());

        let failed = Output {
            status: 1,
            stdout: Vec::new(),
            stderr: b"boom".to_vec(),
        };
        assert!(!failed.success());
    }
}
