//! Pending upload buffer.
//!
//! Holds file bytes that arrive before the upload gate has resolved. The
//! writer half stays with the multipart parsing loop and accepts chunks
//! without ever blocking it; the reader half is handed to the continuation
//! that streams the bytes to the object store once the gate opens.
//! Chunks come out in exactly the order they went in.

use bytes::Bytes;
use tokio::sync::mpsc;

/// A unit of buffered payload as observed by the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadChunk {
    /// A run of file bytes, in arrival order.
    Data(Bytes),
    /// The file stream was cut short by the size ceiling; everything
    /// buffered so far is incomplete and must not be stored.
    Truncated,
}

/// Writer half: appends parser chunks and seals the buffer.
#[derive(Debug)]
pub struct PendingUploadBuffer {
    tx: Option<mpsc::UnboundedSender<PayloadChunk>>,
    bytes_buffered: u64,
}

/// Reader half: yields buffered chunks to the drain continuation.
#[derive(Debug)]
pub struct PendingPayload {
    rx: mpsc::UnboundedReceiver<PayloadChunk>,
}

impl PendingUploadBuffer {
    /// Create a buffer pair.
    pub fn new() -> (PendingUploadBuffer, PendingPayload) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            PendingUploadBuffer {
                tx: Some(tx),
                bytes_buffered: 0,
            },
            PendingPayload { rx },
        )
    }

    /// Append a chunk. Never blocks; chunks appended after finalize (or
    /// after the reader is gone) are discarded.
    pub fn append(&mut self, chunk: Bytes) {
        if let Some(tx) = &self.tx {
            self.bytes_buffered += chunk.len() as u64;
            let _ = tx.send(PayloadChunk::Data(chunk));
        }
    }

    /// Seal the buffer: no more chunks will arrive.
    pub fn finalize(&mut self) {
        self.tx.take();
    }

    /// Seal the buffer with a truncated marker, so the consumer knows the
    /// byte stream was cut short and must not be stored.
    pub fn finalize_truncated(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(PayloadChunk::Truncated);
        }
    }

    /// Whether the buffer has been sealed.
    pub fn is_finalized(&self) -> bool {
        self.tx.is_none()
    }

    /// Total payload bytes appended so far.
    pub fn bytes_buffered(&self) -> u64 {
        self.bytes_buffered
    }
}

impl PendingPayload {
    /// Next buffered chunk, in append order. Returns `None` once the
    /// buffer was finalized and fully drained. May be called before the
    /// writer has finalized; it then waits for the next chunk.
    pub async fn next_chunk(&mut self) -> Option<PayloadChunk> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunks_drain_in_append_order() {
        let (mut buffer, mut payload) = PendingUploadBuffer::new();

        for part in [b"AB".as_slice(), b"CD", b"EF"] {
            buffer.append(Bytes::copy_from_slice(part));
        }
        buffer.finalize();
        assert_eq!(buffer.bytes_buffered(), 6);

        let mut collected = Vec::new();
        while let Some(chunk) = payload.next_chunk().await {
            match chunk {
                PayloadChunk::Data(data) => collected.extend_from_slice(&data),
                PayloadChunk::Truncated => panic!("unexpected truncation"),
            }
        }
        assert_eq!(collected, b"ABCDEF");
    }

    #[tokio::test]
    async fn test_drain_may_start_before_finalize() {
        let (mut buffer, mut payload) = PendingUploadBuffer::new();

        buffer.append(Bytes::from_static(b"early"));
        assert_eq!(
            payload.next_chunk().await,
            Some(PayloadChunk::Data(Bytes::from_static(b"early")))
        );

        buffer.append(Bytes::from_static(b"late"));
        buffer.finalize();
        assert_eq!(
            payload.next_chunk().await,
            Some(PayloadChunk::Data(Bytes::from_static(b"late")))
        );
        assert_eq!(payload.next_chunk().await, None);
    }

    #[tokio::test]
    async fn test_finalize_truncated_ends_with_marker() {
        let (mut buffer, mut payload) = PendingUploadBuffer::new();

        buffer.append(Bytes::from_static(b"partial"));
        buffer.finalize_truncated();
        assert!(buffer.is_finalized());

        assert_eq!(
            payload.next_chunk().await,
            Some(PayloadChunk::Data(Bytes::from_static(b"partial")))
        );
        assert_eq!(payload.next_chunk().await, Some(PayloadChunk::Truncated));
        assert_eq!(payload.next_chunk().await, None);
    }

    #[tokio::test]
    async fn test_append_after_finalize_is_discarded() {
        let (mut buffer, mut payload) = PendingUploadBuffer::new();

        buffer.append(Bytes::from_static(b"kept"));
        buffer.finalize();
        buffer.append(Bytes::from_static(b"dropped"));

        assert_eq!(
            payload.next_chunk().await,
            Some(PayloadChunk::Data(Bytes::from_static(b"kept")))
        );
        assert_eq!(payload.next_chunk().await, None);
        assert_eq!(buffer.bytes_buffered(), 4);
    }

    #[tokio::test]
    async fn test_dropped_reader_discards_quietly() {
        let (mut buffer, payload) = PendingUploadBuffer::new();
        drop(payload);

        // Appends after the reader is gone must not error or panic
        buffer.append(Bytes::from_static(b"nowhere"));
        buffer.finalize();
    }
}
