use std::collections::VecDeque;
use std::io::Read;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::models::BackendId;

const READ_CHUNK: usize = 4096;

/// Bounded byte ring holding recent output for replay on attach.
#[derive(Debug)]
pub struct ScrollbackBuffer {
    buffer: VecDeque<u8>,
    capacity: usize,
}

impl ScrollbackBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(64 * 1024)),
            capacity,
        }
    }

    /// Append, evicting the oldest bytes once full.
    pub fn push(&mut self, data: &[u8]) {
        if self.capacity == 0 {
            return;
        }
        let data = if data.len() > self.capacity {
            &data[data.len() - self.capacity..]
        } else {
            data
        };
        let overflow = (self.buffer.len() + data.len()).saturating_sub(self.capacity);
        self.buffer.drain(..overflow);
        self.buffer.extend(data);
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buffer.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Published once a terminal's output stream ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalExit {
    pub backend_id: BackendId,
}

/// Read pty output on a blocking thread into the scrollback and live channel.
///
/// Scrollback push and broadcast happen under the same lock so an attach
/// that subscribes while holding it sees every byte exactly once.
pub fn spawn_output_reader(
    backend_id: BackendId,
    mut reader: Box<dyn Read + Send>,
    output_tx: broadcast::Sender<Vec<u8>>,
    scrollback: Arc<Mutex<ScrollbackBuffer>>,
    exit_tx: mpsc::UnboundedSender<TerminalExit>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    tracing::debug!("Terminal {} output reached EOF", backend_id);
                    break;
                }
                Ok(n) => {
                    let data = buf[..n].to_vec();
                    match scrollback.lock() {
                        Ok(mut sb) => {
                            sb.push(&data);
                            let _ = output_tx.send(data);
                        }
                        Err(_) => {
                            tracing::warn!("Scrollback lock poisoned for terminal {}", backend_id);
                            let _ = output_tx.send(data);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read terminal {} output: {}", backend_id, e);
                    break;
                }
            }
        }
        if exit_tx.send(TerminalExit { backend_id }).is_err() {
            tracing::trace!("exit event dropped (no listener)");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn push_within_capacity_keeps_everything() {
        let mut sb = ScrollbackBuffer::new(16);
        sb.push(b"hello ");
        sb.push(b"world");
        assert_eq!(sb.contents(), b"hello world");
        assert_eq!(sb.len(), 11);
    }

    #[test]
    fn push_evicts_oldest_bytes() {
        let mut sb = ScrollbackBuffer::new(5);
        sb.push(b"abc");
        sb.push(b"defg");
        assert_eq!(sb.contents(), b"cdefg", "push: should keep the newest bytes");
    }

    #[test]
    fn oversized_chunk_keeps_its_tail() {
        let mut sb = ScrollbackBuffer::new(3);
        sb.push(b"0123456789");
        assert_eq!(sb.contents(), b"789");
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut sb = ScrollbackBuffer::new(0);
        sb.push(b"data");
        assert!(sb.is_empty());
    }

    #[tokio::test]
    async fn reader_fills_scrollback_and_reports_exit() {
        let (tx, mut rx) = broadcast::channel(16);
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
        let scrollback = Arc::new(Mutex::new(ScrollbackBuffer::new(1024)));

        let handle = spawn_output_reader(
            "b1".to_string(),
            Box::new(Cursor::new(b"line one\nline two\n".to_vec())),
            tx,
            scrollback.clone(),
            exit_tx,
        );
        handle.await.unwrap();

        assert_eq!(scrollback.lock().unwrap().contents(), b"line one\nline two\n");
        assert_eq!(rx.recv().await.unwrap(), b"line one\nline two\n".to_vec());
        assert_eq!(
            exit_rx.recv().await,
            Some(TerminalExit {
                backend_id: "b1".to_string()
            })
        );
    }

    proptest! {
        #[test]
        fn scrollback_never_exceeds_capacity(
            cap in 0usize..64,
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..40), 0..20),
        ) {
            let mut sb = ScrollbackBuffer::new(cap);
            let mut all = Vec::new();
            for chunk in &chunks {
                sb.push(chunk);
                all.extend_from_slice(chunk);
            }
            prop_assert!(sb.len() <= cap);
            let expected = &all[all.len().saturating_sub(cap)..];
            prop_assert_eq!(sb.contents(), expected.to_vec());
        }
    }
}
