use std::sync::Arc;

use async_trait::async_trait;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::shell::Shell;
use crate::{Error, Result};

/// A shell on a remote host, reached over SSH with password authentication.
///
/// The connection descriptor is immutable once constructed. Every
/// [`Shell::exec`] call opens its own transport connection, authenticates,
/// runs the command over a fresh session channel and tears the transport
/// down before returning, on success and on failure alike. Nothing is
/// shared between invocations.
#[derive(Clone)]
pub struct PasswordShell {
    host: String,
    port: u16,
    login: String,
    password: String,
}

impl std::fmt::Debug for PasswordShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordShell")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

impl PasswordShell {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            login: login.into(),
            password: password.into(),
        }
    }

    /// Dial the remote host and authenticate. The caller owns the returned
    /// handle and is responsible for disconnecting it.
    async fn connect(&self) -> Result<client::Handle<AcceptingHandler>> {
        let config = Arc::new(client::Config::default());
        let mut handle = client::connect(
            config,
            (self.host.as_str(), self.port),
            AcceptingHandler,
        )
        .await
        .map_err(|source| Error::Connection {
            host: self.host.clone(),
            port: self.port,
            source,
        })?;

        let authenticated = handle
            .authenticate_password(&self.login, &self.password)
            .await
            .map_err(|source| Error::Connection {
                host: self.host.clone(),
                port: self.port,
                source,
            })?;
        if !authenticated {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await;
            return Err(Error::Authentication {
                login: self.login.clone(),
            });
        }
        Ok(handle)
    }
}

#[async_trait]
impl Shell for PasswordShell {
    async fn exec(
        &self,
        command: &str,
        stdin: &mut (dyn AsyncRead + Send + Unpin),
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u32> {
        let handle = self.connect().await?;
        let result = run(&handle, command, stdin, stdout, stderr).await;
        let _ = handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;
        result
    }
}

/// Run one command over a fresh session channel, feeding `stdin` into the
/// remote process concurrently with draining its output, and wait for the
/// exit status.
async fn run(
    handle: &client::Handle<AcceptingHandler>,
    command: &str,
    stdin: &mut (dyn AsyncRead + Send + Unpin),
    stdout: &mut (dyn AsyncWrite + Send + Unpin),
    stderr: &mut (dyn AsyncWrite + Send + Unpin),
) -> Result<u32> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| Error::Channel(format!("cannot open session channel: {e}")))?;
    channel
        .exec(true, command)
        .await
        .map_err(|e| Error::Channel(format!("exec request failed: {e}")))?;

    let mut writer = channel.make_writer_ext(None);
    let feed = async move {
        let mut buf = [0u8; 4096];
        loop {
            let n = match stdin.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    // Caller's input stream failed; still close the remote
                    // stdin so the command can terminate.
                    let _ = writer.shutdown().await;
                    return Err(e);
                }
            };
            // The remote closing its stdin early is not the caller's error.
            if writer.write_all(&buf[..n]).await.is_err() {
                break;
            }
        }
        // EOF tells the remote process its stdin is exhausted.
        let _ = writer.shutdown().await;
        Ok(())
    };
    tokio::pin!(feed);
    let mut feed_done = false;
    let mut feed_result: std::io::Result<()> = Ok(());

    let mut status = None;
    loop {
        tokio::select! {
            res = &mut feed, if !feed_done => {
                feed_done = true;
                feed_result = res;
            }
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { ref data }) => {
                    stdout.write_all(data).await?;
                }
                Some(ChannelMsg::ExtendedData { ref data, ext: 1 }) => {
                    stderr.write_all(data).await?;
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    // Keep draining, data may still be in flight.
                    status = Some(exit_status);
                }
                Some(_) => {}
                None => break,
            },
        }
    }
    stdout.flush().await?;
    stderr.flush().await?;
    feed_result?;

    status.ok_or_else(|| Error::Channel("channel closed without an exit status".into()))
}

/// Client-side handler. Host keys are accepted unconditionally: the
/// descriptor carries no key expectations, password authentication is the
/// only trust anchor in this design.
struct AcceptingHandler;

#[async_trait]
impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_password() {
        let shell = PasswordShell::new("example.com", 22, "deploy", "hunter2");
        let printed = format!("{shell:?}");
        assert!(printed.contains("example.com"));
        assert!(printed.contains("deploy"));
        assert!(!printed.contains("hunter2"));
    }
}
