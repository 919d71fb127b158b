//! Blocking-client bridge.
//!
//! SFTP and FTP clients only speak `std::io`. Writes hand the async source to
//! the blocking pool through [`SyncIoBridge`]. Reads run the client on the
//! blocking pool and push chunks through a bounded channel that the caller
//! consumes as an [`AsyncRead`](tokio::io::AsyncRead); a read error on the
//! blocking side arrives as an `Err` item on the consumer side.

use crate::handle::BoxedReader;
use bytes::Bytes;
use dbward_core::{StorageError, StorageResult, VolumeKind};
use std::io::{self, Read};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::{StreamReader, SyncIoBridge};

/// Chunk size for blocking reads
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks buffered between the blocking reader and the consumer
pub const CHANNEL_DEPTH: usize = 8;

/// Producer side of a bridged read.
///
/// The stream counts as opened on the first [`pump`](ChunkSink::pump). Errors
/// returned by the producer before that fail `blocking_reader` itself;
/// errors after that surface as read errors on the stream.
pub struct ChunkSink {
    tx: mpsc::Sender<io::Result<Bytes>>,
    ready: Option<oneshot::Sender<StorageResult<()>>>,
}

impl ChunkSink {
    fn mark_open(&mut self) {
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Ok(()));
        }
    }

    /// Copy `source` into the channel until EOF
    pub fn pump(&mut self, source: &mut dyn Read) -> io::Result<u64> {
        self.mark_open();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            total += n as u64;
            if self
                .tx
                .blocking_send(Ok(Bytes::copy_from_slice(&buf[..n])))
                .is_err()
            {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "stream consumer went away",
                ));
            }
        }
    }

    fn finish(mut self, result: StorageResult<()>) {
        match result {
            Ok(()) => self.mark_open(),
            Err(e) => match self.ready.take() {
                Some(ready) => {
                    let _ = ready.send(Err(e));
                }
                None => {
                    let _ = self.tx.blocking_send(Err(io::Error::other(e.to_string())));
                }
            },
        }
    }
}

/// Run a blocking producer and expose its output as an async reader.
///
/// Resolves once the producer has opened its source (first `pump`) or
/// failed before doing so.
pub async fn blocking_reader<F>(kind: VolumeKind, produce: F) -> StorageResult<BoxedReader>
where
    F: FnOnce(&mut ChunkSink) -> StorageResult<()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
    let (ready_tx, ready_rx) = oneshot::channel();

    tokio::task::spawn_blocking(move || {
        let mut sink = ChunkSink {
            tx,
            ready: Some(ready_tx),
        };
        let result = produce(&mut sink);
        sink.finish(result);
    });

    match ready_rx.await {
        Ok(Ok(())) => Ok(Box::pin(StreamReader::new(ReceiverStream::new(rx)))),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(StorageError::backend(
            kind,
            "reader task ended before opening the source",
        )),
    }
}

/// Wrap an async source for use inside [`run_blocking`].
///
/// Must be called on the runtime, before moving into the blocking closure.
pub fn sync_source(reader: BoxedReader) -> SyncIoBridge<BoxedReader> {
    SyncIoBridge::new(reader)
}

/// Run blocking client work on the blocking pool
pub async fn run_blocking<T, F>(kind: VolumeKind, work: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StorageError::backend(kind, format!("blocking task failed: {}", e)))?
}
