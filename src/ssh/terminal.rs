// ABOUTME: Interactive terminal channel: pty allocation and shell start.
// ABOUTME: Splits a running shell into an input writer and an output event source.

use super::client::Session;
use super::error::{Error, Result};
use super::pty::PtyRequest;
use bytes::Bytes;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// A session channel with a pty allocated, shell not yet started.
pub struct TerminalChannel {
    channel: Channel<Msg>,
}

impl TerminalChannel {
    /// Open a channel on `session` and request a pty on it.
    pub async fn open(session: &Session, pty: &PtyRequest) -> Result<Self> {
        let mut channel = session.open_channel().await?;

        channel
            .request_pty(true, &pty.term, pty.cols, pty.rows, 0, 0, &pty.modes())
            .await?;
        await_reply(&mut channel, "pty").await?;

        tracing::debug!(term = %pty.term, rows = pty.rows, cols = pty.cols, "pty allocated");
        Ok(Self { channel })
    }

    /// Start the login shell and hand out its standard streams.
    pub async fn start_shell(mut self) -> Result<(ShellInput, ShellOutput)> {
        self.channel.request_shell(true).await?;
        await_reply(&mut self.channel, "shell").await?;

        let input = ShellInput {
            writer: Box::pin(self.channel.make_writer()),
        };
        Ok((input, ShellOutput { channel: self.channel }))
    }
}

/// Wait for the server's answer to a want-reply channel request.
async fn await_reply(channel: &mut Channel<Msg>, request: &'static str) -> Result<()> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(()),
            Some(ChannelMsg::Failure) => return Err(Error::RequestRejected { request }),
            Some(_) => {}
            None => return Err(Error::ChannelClosed),
        }
    }
}

/// Write half of a running shell: bytes written here reach the remote stdin.
pub struct ShellInput {
    writer: Pin<Box<dyn AsyncWrite + Send>>,
}

impl AsyncWrite for ShellInput {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.writer.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.writer.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.writer.as_mut().poll_shutdown(cx)
    }
}

/// What the remote side of a shell produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    /// One chunk of terminal output, as read from the channel.
    Output(Bytes),
    /// The shell reported its exit status.
    Exit(u32),
    /// The remote side will send no more output.
    Eof,
}

/// Read half of a running shell.
pub struct ShellOutput {
    channel: Channel<Msg>,
}

impl ShellOutput {
    /// Next event from the shell; `None` once the channel is closed.
    pub async fn next_event(&mut self) -> Option<ShellEvent> {
        loop {
            match self.channel.wait().await? {
                ChannelMsg::Data { data } => {
                    return Some(ShellEvent::Output(Bytes::copy_from_slice(&data)));
                }
                // With a pty the remote side rarely uses stderr; forward it like stdout.
                ChannelMsg::ExtendedData { data, .. } => {
                    return Some(ShellEvent::Output(Bytes::copy_from_slice(&data)));
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    return Some(ShellEvent::Exit(exit_status));
                }
                ChannelMsg::Eof => return Some(ShellEvent::Eof),
                ChannelMsg::Close => return None,
                _ => {}
            }
        }
    }

    /// Close the channel; the session stays usable.
    pub async fn close(self) {
        if let Err(e) = self.channel.close().await {
            tracing::debug!("shell channel close failed: {}", e);
        }
    }
}
