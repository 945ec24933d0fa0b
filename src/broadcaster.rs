//! Frame broadcasting.
//!
//! The broadcaster samples the animator's buffer on its own fixed-rate clock,
//! frames it for the wire and transmits it, independent of the animation
//! cadence. A transient send failure is logged and the loop keeps going.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use wledlink::{encode_frame, write_header, WledSender, HEADER_LEN};

use crate::animator::Animator;

const IDLE_POLL: Duration = Duration::from_millis(100);
const MAX_POOLED_BUFFERS: usize = 8;

/// Reusable transmit buffers, avoiding a fresh allocation per frame.
struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    fn new() -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
        }
    }

    fn rent(&self, len: usize) -> Vec<u8> {
        let mut buffers = self.buffers.lock().expect("buffer pool poisoned");
        let mut buf = buffers.pop().unwrap_or_default();
        buf.resize(len, 0);
        buf
    }

    fn give_back(&self, buf: Vec<u8>) {
        let mut buffers = self.buffers.lock().expect("buffer pool poisoned");
        if buffers.len() < MAX_POOLED_BUFFERS {
            buffers.push(buf);
        }
    }
}

#[derive(Clone)]
pub struct Broadcaster {
    animator: Animator,
    sender: Arc<WledSender>,
    pool: Arc<BufferPool>,
    active: Arc<AtomicBool>,
    interval: Duration,
    frame_timeout_secs: u8,
}

/// Handle to stop the broadcast loop.
pub struct BroadcastHandle {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl BroadcastHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.handle.await;
    }
}

impl Broadcaster {
    pub fn new(
        animator: Animator,
        sender: Arc<WledSender>,
        interval: Duration,
        frame_timeout_secs: u8,
    ) -> Self {
        Self {
            animator,
            sender,
            pool: Arc::new(BufferPool::new()),
            active: Arc::new(AtomicBool::new(false)),
            interval,
            frame_timeout_secs,
        }
    }

    pub fn set_active(&self, active: bool) {
        let was = self.active.swap(active, Ordering::SeqCst);
        if was != active {
            info!(
                "broadcasting {}",
                if active { "activated" } else { "deactivated" }
            );
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawn the fixed-rate send loop.
    pub fn spawn(&self) -> BroadcastHandle {
        let this = self.clone();
        let (stop_tx, mut stop_rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            let fps = 1000 / this.interval.as_millis().max(1);
            info!(
                "broadcast loop started, interval {}ms (~{fps} FPS)",
                this.interval.as_millis()
            );
            loop {
                if !this.is_active() {
                    tokio::select! {
                        _ = stop_rx.recv() => break,
                        _ = sleep(IDLE_POLL) => continue,
                    }
                }

                this.send_frame().await;

                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = sleep(this.interval) => {}
                }
            }
            info!("broadcast loop stopped");
        });
        BroadcastHandle { stop_tx, handle }
    }

    async fn send_frame(&self) {
        if !self.sender.targets().has_targets().await {
            return;
        }

        let len = HEADER_LEN + self.animator.led_count() * 3;
        let mut buf = self.pool.rent(len);
        write_header(&mut buf, self.frame_timeout_secs);

        match self.animator.copy_to(&mut buf[HEADER_LEN..]) {
            Ok(written) => {
                if let Err(err) = self.sender.send(&buf[..HEADER_LEN + written]).await {
                    warn!("failed to send frame: {err}");
                }
            }
            Err(err) => warn!("failed to snapshot strip: {err}"),
        }

        self.pool.give_back(buf);
    }
}

/// Coalescing frame pipeline: a producer encodes a frame for every animator
/// update into a single-slot channel where the newest frame silently replaces
/// an unsent one, and a consumer sends whatever is current. A lagging sender
/// therefore always transmits the latest state, never a backlog.
pub struct FramePipeline {
    stop_tx: mpsc::Sender<()>,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl FramePipeline {
    pub fn spawn(animator: Animator, sender: Arc<WledSender>, frame_timeout_secs: u8) -> Self {
        let (stop_tx, mut stop_rx) = mpsc::channel(1);
        let (frame_tx, mut frame_rx) = watch::channel(Vec::new());
        let mut updates = animator.updates();

        let producer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let frame = encode_frame(frame_timeout_secs, &animator.snapshot());
                        let _ = frame_tx.send(frame);
                    }
                }
            }
        });

        let consumer = tokio::spawn(async move {
            while frame_rx.changed().await.is_ok() {
                let frame = frame_rx.borrow_and_update().clone();
                if let Err(err) = sender.send(&frame).await {
                    warn!("failed to send frame: {err}");
                }
            }
        });

        Self {
            stop_tx,
            producer,
            consumer,
        }
    }

    /// Stop the producer; the consumer drains once the frame slot closes.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.producer.await;
        let _ = self.consumer.await;
    }
}
