// ABOUTME: Terminal bridge between a client endpoint and a remote pty shell.
// ABOUTME: Type-state transitions (dial, pty, shell) and the two byte pumps.

use async_trait::async_trait;
use snafu::ResultExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::{BridgeError, ConnectSnafu, PtySnafu, RemoteInputSnafu, ShellSnafu};
use super::state::{Authenticated, BridgeState, CloseKind, Idle, PtyRequested, Stage};
use crate::ssh::{ConnectionSpec, PtyRequest, Session, ShellEvent, ShellOutput, TerminalChannel};

/// Largest chunk moved from the client to the remote shell in one write.
const INPUT_BUFFER: usize = 8192;

/// How a bridge that ran to completion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The remote shell closed its channel, with its exit status when it sent one.
    RemoteExit { exit_status: Option<u32> },
    /// The client endpoint closed or failed.
    ClientDisconnect,
}

/// Source of remote shell events, the seam between the pumps and the SSH channel.
#[async_trait]
pub trait RemoteOutput: Send {
    async fn next_event(&mut self) -> Option<ShellEvent>;
}

#[async_trait]
impl RemoteOutput for ShellOutput {
    async fn next_event(&mut self) -> Option<ShellEvent> {
        ShellOutput::next_event(self).await
    }
}

/// One relay between an SSH pty shell and a client, moving through
/// `Idle → Dialing → Authenticated → PtyRequested → ShellRunning → Closed`.
///
/// Each transition consumes the bridge. A failed transition closes whatever was opened
/// and returns the error; nothing is retried.
pub struct TerminalBridge<S> {
    target: String,
    stage: S,
}

impl<S: Stage> TerminalBridge<S> {
    fn enter(target: String, stage: S) -> Self {
        log_state(&target, S::STATE);
        Self { target, stage }
    }

    pub fn state(&self) -> BridgeState {
        S::STATE
    }

    /// `address:port` of the remote host.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl TerminalBridge<Idle> {
    pub fn new(spec: ConnectionSpec) -> Self {
        Self::enter(spec.target(), Idle { spec })
    }

    /// Dial and authenticate.
    pub async fn dial(self) -> Result<TerminalBridge<Authenticated>, BridgeError> {
        let TerminalBridge {
            target,
            stage: Idle { spec },
        } = self;

        log_state(&target, BridgeState::Dialing);
        match Session::connect(spec).await {
            Ok(session) => Ok(TerminalBridge::enter(target, Authenticated { session })),
            Err(source) => {
                log_failure(&target, &source);
                Err(source).context(ConnectSnafu)
            }
        }
    }
}

impl TerminalBridge<Authenticated> {
    pub fn session(&self) -> &Session {
        &self.stage.session
    }

    /// Allocate the pty the shell will run on.
    pub async fn request_pty(
        self,
        pty: &PtyRequest,
    ) -> Result<TerminalBridge<PtyRequested>, BridgeError> {
        let TerminalBridge {
            target,
            stage: Authenticated { session },
        } = self;

        match TerminalChannel::open(&session, pty).await {
            Ok(terminal) => Ok(TerminalBridge::enter(
                target,
                PtyRequested { session, terminal },
            )),
            Err(source) => {
                log_failure(&target, &source);
                close_session(session).await;
                Err(source).context(PtySnafu)
            }
        }
    }
}

impl TerminalBridge<PtyRequested> {
    /// Start the remote shell and relay until either side closes.
    ///
    /// `client_in` yields the client's input bytes (see [`super::ClientReader`]);
    /// `client_out` receives remote output, one write per chunk read from the shell.
    pub async fn start_and_bridge<R, W>(
        self,
        client_in: R,
        client_out: W,
    ) -> Result<Termination, BridgeError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let target = self.target;
        let PtyRequested { session, terminal } = self.stage;

        let (shell_in, mut shell_out) = match terminal.start_shell().await {
            Ok(io) => io,
            Err(source) => {
                log_failure(&target, &source);
                close_session(session).await;
                return Err(source).context(ShellSnafu);
            }
        };
        log_state(&target, BridgeState::ShellRunning);

        let result = pump(client_in, client_out, shell_in, &mut shell_out).await;

        shell_out.close().await;
        close_session(session).await;

        match &result {
            Ok(termination) => {
                tracing::info!(target = %target, ?termination, "console relay finished");
                log_state(&target, BridgeState::Closed(CloseKind::Normal));
            }
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "console relay failed");
                log_state(&target, BridgeState::Closed(CloseKind::Error));
            }
        }
        result
    }
}

/// Dial, allocate `pty`, and relay until either side closes.
pub async fn relay<R, W>(
    spec: ConnectionSpec,
    pty: &PtyRequest,
    client_in: R,
    client_out: W,
) -> Result<Termination, BridgeError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    TerminalBridge::new(spec)
        .dial()
        .await?
        .request_pty(pty)
        .await?
        .start_and_bridge(client_in, client_out)
        .await
}

/// Run both directions until one of them ends.
///
/// The client-to-remote pump ends on client EOF or client transport error; the
/// remote-to-client pump ends when the shell channel closes or a client write fails.
pub async fn pump<CR, CW, RI, RO>(
    mut client_in: CR,
    mut client_out: CW,
    mut remote_in: RI,
    remote_out: &mut RO,
) -> Result<Termination, BridgeError>
where
    CR: AsyncRead + Unpin,
    CW: AsyncWrite + Unpin,
    RI: AsyncWrite + Unpin,
    RO: RemoteOutput + ?Sized,
{
    tokio::select! {
        result = forward_input(&mut client_in, &mut remote_in) => result,
        termination = forward_output(remote_out, &mut client_out) => Ok(termination),
    }
}

async fn forward_input<R, W>(client: &mut R, remote: &mut W) -> Result<Termination, BridgeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; INPUT_BUFFER];
    loop {
        let n = match client.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("client closed the connection");
                return Ok(Termination::ClientDisconnect);
            }
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "client transport failed");
                return Ok(Termination::ClientDisconnect);
            }
        };
        remote.write_all(&buf[..n]).await.context(RemoteInputSnafu)?;
        remote.flush().await.context(RemoteInputSnafu)?;
    }
}

async fn forward_output<O, W>(remote: &mut O, client: &mut W) -> Termination
where
    O: RemoteOutput + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut exit_status = None;
    while let Some(event) = remote.next_event().await {
        match event {
            ShellEvent::Output(chunk) => {
                if chunk.is_empty() {
                    continue;
                }
                if let Err(e) = write_frame(client, &chunk).await {
                    tracing::debug!(error = %e, "client write failed");
                    return Termination::ClientDisconnect;
                }
            }
            ShellEvent::Exit(status) => {
                tracing::debug!(exit_status = status, "remote shell exited");
                exit_status = Some(status);
            }
            ShellEvent::Eof => {}
        }
    }
    Termination::RemoteExit { exit_status }
}

async fn write_frame<W: AsyncWrite + Unpin>(client: &mut W, chunk: &[u8]) -> std::io::Result<()> {
    client.write_all(chunk).await?;
    client.flush().await
}

async fn close_session(session: Session) {
    if let Err(e) = session.disconnect().await {
        tracing::debug!("SSH disconnect failed: {}", e);
    }
}

fn log_state(target: &str, state: BridgeState) {
    tracing::debug!(target = %target, state = %state, "bridge state");
}

fn log_failure(target: &str, error: &crate::ssh::Error) {
    tracing::warn!(target = %target, error = %error, "bridge transition failed");
    log_state(target, BridgeState::Closed(CloseKind::Error));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{ClientReader, ClientWriter};
    use bytes::Bytes;
    use futures::channel::mpsc as frames;
    use futures::{StreamExt, stream};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct FakeShell {
        events: mpsc::UnboundedReceiver<ShellEvent>,
    }

    #[async_trait]
    impl RemoteOutput for FakeShell {
        async fn next_event(&mut self) -> Option<ShellEvent> {
            self.events.recv().await
        }
    }

    fn fake_shell() -> (mpsc::UnboundedSender<ShellEvent>, FakeShell) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, FakeShell { events: rx })
    }

    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel gone")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    type Lines = stream::Iter<std::vec::IntoIter<io::Result<Bytes>>>;

    fn client_lines(lines: &[&'static str]) -> ClientReader<Lines> {
        let items: Vec<io::Result<Bytes>> = lines
            .iter()
            .copied()
            .map(|line| Ok(Bytes::from_static(line.as_bytes())))
            .collect();
        ClientReader::new(stream::iter(items))
    }

    fn silent_client() -> ClientReader<stream::Pending<io::Result<Bytes>>> {
        ClientReader::new(stream::pending())
    }

    #[tokio::test]
    async fn client_lines_reach_the_shell_in_order() {
        let (_events, mut shell) = fake_shell();
        let (out_tx, _out_rx) = frames::unbounded::<Bytes>();
        let mut remote_in = Vec::<u8>::new();

        let termination = pump(
            client_lines(&["ls", "pwd"]),
            ClientWriter::new(out_tx),
            &mut remote_in,
            &mut shell,
        )
        .await
        .unwrap();

        assert_eq!(termination, Termination::ClientDisconnect);
        assert_eq!(remote_in, b"ls\npwd\n");
    }

    #[tokio::test]
    async fn each_output_chunk_becomes_one_frame() {
        let (events, mut shell) = fake_shell();
        let (out_tx, out_rx) = frames::unbounded::<Bytes>();

        events.send(ShellEvent::Output(Bytes::from_static(b"total 0\r\n"))).unwrap();
        events.send(ShellEvent::Output(Bytes::new())).unwrap();
        events.send(ShellEvent::Output(Bytes::from_static(b"$ "))).unwrap();
        events.send(ShellEvent::Eof).unwrap();
        events.send(ShellEvent::Exit(0)).unwrap();
        drop(events);

        let termination = pump(silent_client(), ClientWriter::new(out_tx), tokio::io::sink(), &mut shell)
            .await
            .unwrap();

        assert_eq!(termination, Termination::RemoteExit { exit_status: Some(0) });
        let sent: Vec<Bytes> = out_rx.collect().await;
        assert_eq!(
            sent,
            vec![Bytes::from_static(b"total 0\r\n"), Bytes::from_static(b"$ ")]
        );
    }

    #[tokio::test]
    async fn channel_close_without_status_reports_none() {
        let (events, mut shell) = fake_shell();
        let (out_tx, _out_rx) = frames::unbounded::<Bytes>();
        drop(events);

        let termination = pump(silent_client(), ClientWriter::new(out_tx), tokio::io::sink(), &mut shell)
            .await
            .unwrap();

        assert_eq!(termination, Termination::RemoteExit { exit_status: None });
    }

    #[tokio::test]
    async fn client_close_ends_the_bridge_promptly() {
        let (_events, mut shell) = fake_shell();
        let (out_tx, _out_rx) = frames::unbounded::<Bytes>();

        let termination = tokio::time::timeout(
            Duration::from_secs(1),
            pump(client_lines(&[]), ClientWriter::new(out_tx), tokio::io::sink(), &mut shell),
        )
        .await
        .expect("bridge should end when the client closes")
        .unwrap();

        assert_eq!(termination, Termination::ClientDisconnect);
    }

    #[tokio::test]
    async fn failed_client_write_is_a_disconnect() {
        let (events, mut shell) = fake_shell();
        let (out_tx, out_rx) = frames::unbounded::<Bytes>();
        drop(out_rx);
        events.send(ShellEvent::Output(Bytes::from_static(b"hello\r\n"))).unwrap();

        let termination = pump(silent_client(), ClientWriter::new(out_tx), tokio::io::sink(), &mut shell)
            .await
            .unwrap();

        assert_eq!(termination, Termination::ClientDisconnect);
    }

    #[tokio::test]
    async fn failed_shell_write_closes_with_error() {
        let (_events, mut shell) = fake_shell();
        let (out_tx, _out_rx) = frames::unbounded::<Bytes>();
        let client = ClientReader::new(
            stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(b"ls"))]).chain(stream::pending()),
        );

        let err = pump(client, ClientWriter::new(out_tx), BrokenPipe, &mut shell)
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::RemoteInput { .. }));
        assert_eq!(err.kind(), crate::ssh::ErrorKind::Io);
    }

    #[tokio::test]
    async fn client_transport_error_is_a_disconnect() {
        let (_events, mut shell) = fake_shell();
        let (out_tx, _out_rx) = frames::unbounded::<Bytes>();
        let client = ClientReader::new(stream::iter(vec![Err::<Bytes, _>(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        ))]));

        let termination = pump(client, ClientWriter::new(out_tx), tokio::io::sink(), &mut shell)
            .await
            .unwrap();

        assert_eq!(termination, Termination::ClientDisconnect);
    }
}
