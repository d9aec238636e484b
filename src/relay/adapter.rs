// ABOUTME: Stream adapters between message frames and byte streams.
// ABOUTME: ClientReader turns frames into newline-terminated input; ClientWriter emits one frame per write.

use bytes::{BufMut, Bytes, BytesMut};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::error::Error as StdError;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Byte-stream view of the client's inbound frames.
///
/// Every frame is one line of input: its payload followed by a single `\n`. A read never
/// returns bytes from two different frames, and the stream ends (read of 0) when the
/// frame source ends.
pub struct ClientReader<S> {
    frames: S,
    pending: Bytes,
    finished: bool,
}

impl<S> ClientReader<S> {
    pub fn new(frames: S) -> Self {
        Self {
            frames,
            pending: Bytes::new(),
            finished: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.frames
    }
}

impl<S, E> AsyncRead for ClientReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<BoxError>,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;

        if this.pending.is_empty() {
            if this.finished {
                return Poll::Ready(Ok(()));
            }
            match ready!(this.frames.poll_next_unpin(cx)) {
                Some(Ok(frame)) => {
                    let mut line = BytesMut::with_capacity(frame.len() + 1);
                    line.extend_from_slice(&frame);
                    line.put_u8(b'\n');
                    this.pending = line.freeze();
                }
                Some(Err(e)) => return Poll::Ready(Err(io::Error::other(e))),
                None => {
                    this.finished = true;
                    return Poll::Ready(Ok(()));
                }
            }
        }

        let n = this.pending.len().min(buf.remaining());
        buf.put_slice(&this.pending.split_to(n));
        Poll::Ready(Ok(()))
    }
}

/// Byte-sink view of the client's outbound frames: each write becomes exactly one frame.
pub struct ClientWriter<K> {
    frames: K,
}

impl<K> ClientWriter<K> {
    pub fn new(frames: K) -> Self {
        Self { frames }
    }

    pub fn into_inner(self) -> K {
        self.frames
    }
}

impl<K> AsyncWrite for ClientWriter<K>
where
    K: Sink<Bytes> + Unpin,
    K::Error: Into<BoxError>,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        ready!(self.frames.poll_ready_unpin(cx)).map_err(io::Error::other)?;
        self.frames
            .start_send_unpin(Bytes::copy_from_slice(buf))
            .map_err(io::Error::other)?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.frames.poll_flush_unpin(cx).map_err(io::Error::other)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.frames.poll_close_unpin(cx).map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::stream;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn frames(lines: &[&'static str]) -> impl Stream<Item = io::Result<Bytes>> + Unpin {
        stream::iter(
            lines
                .iter()
                .copied()
                .map(|line| Ok(Bytes::from_static(line.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn each_frame_becomes_one_line() {
        let mut reader = ClientReader::new(frames(&["ls", "pwd"]));
        let mut buf = [0u8; 64];

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ls\n");

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pwd\n");

        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn frame_payload_is_passed_verbatim() {
        let mut reader = ClientReader::new(frames(&["echo 'a  b' ; tab\there", ""]));
        let mut all = Vec::new();

        reader.read_to_end(&mut all).await.unwrap();

        assert_eq!(all, b"echo 'a  b' ; tab\there\n\n");
    }

    #[tokio::test]
    async fn small_buffer_splits_a_line_in_order() {
        let mut reader = ClientReader::new(frames(&["uptime"]));
        let mut buf = [0u8; 4];

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"upti");
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"me\n");
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transport_error_surfaces_as_io_error() {
        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"ls")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
        ]);
        let mut reader = ClientReader::new(failing);
        let mut buf = [0u8; 16];

        assert_eq!(reader.read(&mut buf).await.unwrap(), 3);
        let err = reader.read(&mut buf).await.unwrap_err();
        assert!(err.to_string().contains("reset by peer"));
    }

    #[tokio::test]
    async fn each_write_is_one_frame() {
        let (tx, rx) = mpsc::unbounded::<Bytes>();
        let mut writer = ClientWriter::new(tx);

        writer.write_all(b"total 0\r\n").await.unwrap();
        writer.write_all(b"$ ").await.unwrap();
        writer.flush().await.unwrap();
        drop(writer);

        let sent: Vec<Bytes> = rx.collect().await;
        assert_eq!(
            sent,
            vec![Bytes::from_static(b"total 0\r\n"), Bytes::from_static(b"$ ")]
        );
    }

    #[tokio::test]
    async fn empty_write_sends_nothing() {
        let (tx, rx) = mpsc::unbounded::<Bytes>();
        let mut writer = ClientWriter::new(tx);

        assert_eq!(writer.write(b"").await.unwrap(), 0);
        drop(writer);

        let sent: Vec<Bytes> = rx.collect().await;
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn write_fails_once_client_is_gone() {
        let (tx, rx) = mpsc::unbounded::<Bytes>();
        drop(rx);
        let mut writer = ClientWriter::new(tx);

        assert!(writer.write_all(b"lost").await.is_err());
    }
}
