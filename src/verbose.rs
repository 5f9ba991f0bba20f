use core::pin::Pin;
use core::task::{Context, Poll};
use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::shell::Shell;
use crate::Result;

/// Decorates any [`Shell`] with diagnostic logging.
///
/// Every call is forwarded to the wrapped shell unchanged; the bytes flowing
/// through stdout and stderr are additionally mirrored to `tracing`, one
/// event per output line (stdout at INFO, stderr at WARN). Decoration never
/// alters the bytes delivered to the caller, the exit code, or the failure
/// behavior of the wrapped shell.
#[derive(Debug)]
pub struct Verbose<S> {
    inner: S,
}

impl<S> Verbose<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> Shell for Verbose<S>
where
    S: Shell + Send + Sync,
{
    async fn exec(
        &self,
        command: &str,
        stdin: &mut (dyn AsyncRead + Send + Unpin),
        stdout: &mut (dyn AsyncWrite + Send + Unpin),
        stderr: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u32> {
        tracing::debug!(command, "executing remote command");
        let mut out = Tee::new(stdout, LogLines::new(StreamKind::Stdout));
        let mut err = Tee::new(stderr, LogLines::new(StreamKind::Stderr));
        let status = self.inner.exec(command, stdin, &mut out, &mut err).await;
        out.into_diag().finish();
        err.into_diag().finish();
        if let Ok(code) = &status {
            tracing::debug!(code = *code, "remote command finished");
        }
        status
    }
}

/// Forwards writes to the caller's sink and mirrors every byte the sink
/// accepted into a diagnostic writer. Diagnostic-side results are ignored so
/// that decoration cannot change the outcome of the wrapped call.
struct Tee<'a, D> {
    main: &'a mut (dyn AsyncWrite + Send + Unpin),
    diag: D,
}

impl<'a, D> Tee<'a, D>
where
    D: AsyncWrite + Send + Unpin,
{
    fn new(main: &'a mut (dyn AsyncWrite + Send + Unpin), diag: D) -> Self {
        Self { main, diag }
    }

    fn into_diag(self) -> D {
        self.diag
    }
}

impl<'a, D> AsyncWrite for Tee<'a, D>
where
    D: AsyncWrite + Send + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut *this.main).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                let _ = Pin::new(&mut this.diag).poll_write(cx, &buf[..n]);
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let _ = Pin::new(&mut this.diag).poll_flush(cx);
        Pin::new(&mut *this.main).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let _ = Pin::new(&mut this.diag).poll_shutdown(cx);
        Pin::new(&mut *this.main).poll_shutdown(cx)
    }
}

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// Buffers mirrored output and emits one tracing event per completed line.
/// Always ready: this writer never blocks the data path.
struct LogLines {
    kind: StreamKind,
    buf: Vec<u8>,
}

impl LogLines {
    fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            buf: Vec::new(),
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.emit(&line[..line.len() - 1]);
        }
    }

    fn emit(&self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        match self.kind {
            StreamKind::Stdout => tracing::info!("{line}"),
            StreamKind::Stderr => tracing::warn!("{line}"),
        }
    }

    /// Emits whatever is buffered without a trailing newline.
    fn finish(mut self) {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            self.emit(&rest);
        }
    }
}

impl AsyncWrite for LogLines {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().push(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Output, Result};
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn tee_mirrors_accepted_bytes() {
        let mut main: Vec<u8> = Vec::new();
        let mut tee = Tee::new(&mut main, Vec::new());
        tee.write_all(b"first chunk ").await.unwrap();
        tee.write_all(b"second chunk").await.unwrap();
        tee.flush().await.unwrap();
        let diag = tee.into_diag();
        assert_eq!(main, b"first chunk second chunk");
        assert_eq!(diag, main);
    }

    #[test]
    fn log_lines_buffers_partial_lines() {
        let mut lines = LogLines::new(StreamKind::Stdout);
        lines.push(b"one\ntwo\nthree");
        assert_eq!(lines.buf, b"three");
        lines.push(b" and more\n");
        assert!(lines.buf.is_empty());
    }

    struct StaticShell;

    #[async_trait]
    impl Shell for StaticShell {
        async fn exec(
            &self,
            _command: &str,
            _stdin: &mut (dyn AsyncRead + Send + Unpin),
            stdout: &mut (dyn AsyncWrite + Send + Unpin),
            stderr: &mut (dyn AsyncWrite + Send + Unpin),
        ) -> Result<u32> {
            stdout.write_all(b"out bytes\n").await?;
            stderr.write_all(b"partial err").await?;
            Ok(7)
        }
    }

    #[tokio::test]
    async fn decoration_does_not_alter_result() {
        let plain = StaticShell.output("anything").await.unwrap();
        let decorated = Verbose::new(StaticShell).output("anything").await.unwrap();
        assert_eq!(
            decorated,
            Output {
                status: 7,
                stdout: b"out bytes\n".to_vec(),
                stderr: b"partial err".to_vec(),
            }
        );
        assert_eq!(decorated, plain);
    }
}
