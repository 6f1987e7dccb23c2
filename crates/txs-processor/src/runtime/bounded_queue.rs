use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Current and high-water depth of a bounded queue, shared by both ends.
#[derive(Clone, Debug, Default)]
pub struct QueueDepth {
    current: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl QueueDepth {
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::Relaxed)
    }

    fn pushed(&self) {
        let now = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.max.fetch_max(now, Ordering::Relaxed);
    }

    fn popped(&self) {
        let _ = self.current.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub struct BoundedSender<T> {
    inner: mpsc::Sender<T>,
    depth: QueueDepth,
}

pub struct BoundedReceiver<T> {
    inner: mpsc::Receiver<T>,
    depth: QueueDepth,
}

pub fn bounded<T>(capacity: usize) -> Result<(BoundedSender<T>, BoundedReceiver<T>)> {
    if capacity == 0 {
        return Err(Error::ConfigInvalid(
            "queue_capacity must be >= 1".to_string(),
        ));
    }

    let (tx, rx) = mpsc::channel(capacity);
    let depth = QueueDepth::default();
    Ok((
        BoundedSender {
            inner: tx,
            depth: depth.clone(),
        },
        BoundedReceiver { inner: rx, depth },
    ))
}

impl<T> BoundedSender<T> {
    /// Waits for capacity. Fails once the receiving side is gone.
    pub async fn send(&self, item: T) -> Result<()> {
        self.inner
            .send(item)
            .await
            .map_err(|_| Error::Source("queue receiver dropped".to_string()))?;
        self.depth.pushed();
        Ok(())
    }
}

impl<T> BoundedReceiver<T> {
    /// `None` once every sender is dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<T> {
        let item = self.inner.recv().await;
        if item.is_some() {
            self.depth.popped();
        }
        item
    }

    pub fn depth(&self) -> QueueDepth {
        self.depth.clone()
    }
}
