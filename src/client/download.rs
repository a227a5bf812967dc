//! Blocking reader over a streamed download.
//!
//! [`DownloadStream`] is returned before any byte arrives. A Tokio task sends
//! the request (with the same 401 re-login policy as every other call) and
//! forwards body chunks through a bounded channel. While the channel is full
//! the task stops polling the network, so a slow reader slows the transfer.
//!
//! The task always finishes with an explicit end or failure frame. A channel
//! that closes without one is reported as `UnexpectedEof`, so a transfer that
//! dies is never mistaken for a complete file. Dropping the reader stops the
//! task and with it the HTTP transfer.

use std::fmt;
use std::io::{self, Read};

use bytes::{Buf, Bytes};
use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::AssemblylineClient;
use super::error::ClientError;
use super::executor::ApiRequest;

/// Chunks buffered between the network task and the reader.
const CHANNEL_CAPACITY: usize = 8;

#[derive(Debug)]
enum Frame {
    Data(Bytes),
    End,
    Failed(io::Error),
}

#[derive(Debug)]
enum ReadState {
    Open,
    Finished,
    Failed { kind: io::ErrorKind, message: String },
}

/// A file download exposed as [`std::io::Read`].
///
/// Reads block the calling thread until data, end of file or an error
/// arrives. An error is sticky: every later read returns it again.
///
/// # Panics
///
/// [`read`](Read::read) panics when called from inside an async context,
/// because it blocks on the channel. Read it from a plain thread or from
/// [`tokio::task::spawn_blocking`].
pub struct DownloadStream {
    rx: mpsc::Receiver<Frame>,
    current: Bytes,
    state: ReadState,
    task: JoinHandle<()>,
}

impl DownloadStream {
    fn new(rx: mpsc::Receiver<Frame>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            current: Bytes::new(),
            state: ReadState::Open,
            task,
        }
    }

    fn fail(&mut self, error: io::Error) -> io::Error {
        self.state = ReadState::Failed {
            kind: error.kind(),
            message: error.to_string(),
        };
        error
    }
}

impl Read for DownloadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if !self.current.is_empty() {
                let n = buf.len().min(self.current.len());
                buf[..n].copy_from_slice(&self.current[..n]);
                self.current.advance(n);
                return Ok(n);
            }

            match &self.state {
                ReadState::Open => {}
                ReadState::Finished => return Ok(0),
                ReadState::Failed { kind, message } => {
                    return Err(io::Error::new(*kind, message.clone()));
                }
            }

            match self.rx.blocking_recv() {
                Some(Frame::Data(chunk)) => self.current = chunk,
                Some(Frame::End) => self.state = ReadState::Finished,
                Some(Frame::Failed(error)) => return Err(self.fail(error)),
                None => {
                    let error = io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "download stopped before the transfer completed",
                    );
                    return Err(self.fail(error));
                }
            }
        }
    }
}

impl Drop for DownloadStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadStream")
            .field("buffered", &self.current.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Starts the transfer for `request` on `handle` and returns the reader.
pub(crate) fn spawn(client: AssemblylineClient, request: ApiRequest, handle: &Handle) -> DownloadStream {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let task = handle.spawn(async move {
        tokio::select! {
            () = tx.closed() => debug!(url = %request.url, "download reader dropped; stopping transfer"),
            () = pump(&client, &request, &tx) => {}
        }
    });
    DownloadStream::new(rx, task)
}

async fn pump(client: &AssemblylineClient, request: &ApiRequest, tx: &mpsc::Sender<Frame>) {
    let frame = match transfer(client, request, tx).await {
        Ok(()) => Frame::End,
        Err(error) => {
            warn!(url = %request.url, error = %error, "download failed");
            Frame::Failed(into_io_error(error))
        }
    };
    // The reader may already be gone.
    let _ = tx.send(frame).await;
}

async fn transfer(
    client: &AssemblylineClient,
    request: &ApiRequest,
    tx: &mpsc::Sender<Frame>,
) -> Result<(), ClientError> {
    let core = &client.core;
    let session = client.session.as_ref();
    let bearer = client.bearer_token();
    let response = core
        .retry_unauthorized(session, bearer, move || {
            core.send(session, bearer, request, false)
        })
        .await?;

    debug!(url = %request.url, length = ?response.content_length(), "download started");
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| ClientError::network(request.url.as_str(), e))?;
        if tx.send(Frame::Data(chunk)).await.is_err() {
            return Ok(());
        }
    }
    Ok(())
}

fn into_io_error(error: ClientError) -> io::Error {
    let kind = match &error {
        ClientError::Timeout { .. } => io::ErrorKind::TimedOut,
        ClientError::Transport { .. } => io::ErrorKind::ConnectionAborted,
        ClientError::Unauthorized(_) => io::ErrorKind::PermissionDenied,
        ClientError::ClientStatus(api) if api.status() == 404 => io::ErrorKind::NotFound,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, error)
}
