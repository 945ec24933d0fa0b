//! Two-phase countdown timer.
//!
//! States: Idle -> PreCountdown -> Running -> Idle. The main duration gets a
//! uniform random deviation applied at start. Phase transitions and 1 s ticks
//! are published on a broadcast channel; state mutations happen inside the
//! tick task or the Start/Stop commands, serialized by one mutex.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;

const TICK: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CountdownPhase {
    Idle,
    PreCountdown,
    Running,
}

#[derive(Debug, Clone)]
pub enum CountdownEvent {
    PreCountdownStarted { duration: Duration },
    Started { duration: Duration },
    Tick { phase: CountdownPhase, remaining: Duration },
    Ended,
}

/// Point-in-time view of the timer, for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct CountdownStatus {
    pub is_running: bool,
    pub is_pre_countdown_running: bool,
    pub remaining_secs: u64,
    pub pre_remaining_secs: u64,
}

#[derive(Clone)]
pub struct CountdownTimer {
    inner: Arc<Mutex<TimerInner>>,
    events: broadcast::Sender<CountdownEvent>,
}

struct TimerInner {
    phase: CountdownPhase,
    remaining_secs: u64,
    pre_remaining_secs: u64,
    stop_tx: Option<mpsc::Sender<()>>,
    generation: u64,
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownTimer {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(TimerInner {
                phase: CountdownPhase::Idle,
                remaining_secs: 0,
                pre_remaining_secs: 0,
                stop_tx: None,
                generation: 0,
            })),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CountdownEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().expect("countdown state poisoned").phase == CountdownPhase::Running
    }

    pub fn is_pre_countdown_running(&self) -> bool {
        self.inner.lock().expect("countdown state poisoned").phase
            == CountdownPhase::PreCountdown
    }

    pub fn status(&self) -> CountdownStatus {
        let guard = self.inner.lock().expect("countdown state poisoned");
        CountdownStatus {
            is_running: guard.phase == CountdownPhase::Running,
            is_pre_countdown_running: guard.phase == CountdownPhase::PreCountdown,
            remaining_secs: guard.remaining_secs,
            pre_remaining_secs: guard.pre_remaining_secs,
        }
    }

    /// Start the main countdown with a uniform random deviation applied to
    /// the duration. Ignored when a phase is already active.
    pub fn start(&self, duration: Duration, deviation: Duration) {
        let actual = {
            let mut guard = self.inner.lock().expect("countdown state poisoned");
            if guard.phase != CountdownPhase::Idle {
                debug!("countdown already active, ignoring start");
                return;
            }
            let actual = apply_deviation(duration, deviation);
            guard.phase = CountdownPhase::Running;
            guard.remaining_secs = actual.as_secs();
            guard.generation += 1;
            let (stop_tx, stop_rx) = mpsc::channel(1);
            guard.stop_tx = Some(stop_tx);
            tokio::spawn(run_countdown(
                self.inner.clone(),
                self.events.clone(),
                guard.generation,
                stop_rx,
            ));
            actual
        };
        info!("countdown started for {}s", actual.as_secs());
        let _ = self.events.send(CountdownEvent::Started { duration: actual });
    }

    /// Run a pre-countdown first, then transition into the main countdown.
    /// Ignored when a phase is already active.
    pub fn start_with_pre_countdown(
        &self,
        pre_duration: Duration,
        duration: Duration,
        deviation: Duration,
    ) {
        {
            let mut guard = self.inner.lock().expect("countdown state poisoned");
            if guard.phase != CountdownPhase::Idle {
                debug!("countdown already active, ignoring start with pre-countdown");
                return;
            }
            guard.phase = CountdownPhase::PreCountdown;
            guard.pre_remaining_secs = pre_duration.as_secs();
            guard.generation += 1;
            let (stop_tx, stop_rx) = mpsc::channel(1);
            guard.stop_tx = Some(stop_tx);
            tokio::spawn(run_pre_countdown(
                self.clone(),
                guard.generation,
                stop_rx,
                duration,
                deviation,
            ));
        }
        info!("pre-countdown started for {}s", pre_duration.as_secs());
        let _ = self.events.send(CountdownEvent::PreCountdownStarted {
            duration: pre_duration,
        });
    }

    /// Cancel whichever phase is active. Idempotent when already idle.
    pub fn stop(&self) {
        let stop_tx = {
            let mut guard = self.inner.lock().expect("countdown state poisoned");
            if guard.phase == CountdownPhase::Idle {
                debug!("countdown already idle, ignoring stop");
                return;
            }
            guard.stop_tx.take()
        };
        if let Some(tx) = stop_tx {
            let _ = tx.try_send(());
        }
    }
}

fn apply_deviation(duration: Duration, deviation: Duration) -> Duration {
    let base = duration.as_secs() as i64;
    let dev = deviation.as_secs() as i64;
    let offset = if dev == 0 {
        0
    } else {
        rand::thread_rng().gen_range(-dev..=dev)
    };
    Duration::from_secs(base.saturating_add(offset).max(0) as u64)
}

async fn run_countdown(
    inner: Arc<Mutex<TimerInner>>,
    events: broadcast::Sender<CountdownEvent>,
    generation: u64,
    mut stop_rx: mpsc::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                {
                    let mut guard = inner.lock().expect("countdown state poisoned");
                    if guard.generation != generation {
                        return;
                    }
                    guard.phase = CountdownPhase::Idle;
                    guard.remaining_secs = 0;
                    guard.stop_tx = None;
                }
                info!("countdown stopped");
                let _ = events.send(CountdownEvent::Ended);
                return;
            }
            _ = sleep(TICK) => {
                let (remaining, done) = {
                    let mut guard = inner.lock().expect("countdown state poisoned");
                    if guard.generation != generation || guard.phase != CountdownPhase::Running {
                        return;
                    }
                    guard.remaining_secs = guard.remaining_secs.saturating_sub(1);
                    let remaining = guard.remaining_secs;
                    let done = remaining == 0;
                    if done {
                        guard.phase = CountdownPhase::Idle;
                        guard.stop_tx = None;
                    }
                    (remaining, done)
                };
                let _ = events.send(CountdownEvent::Tick {
                    phase: CountdownPhase::Running,
                    remaining: Duration::from_secs(remaining),
                });
                if done {
                    info!("countdown ended");
                    let _ = events.send(CountdownEvent::Ended);
                    return;
                }
            }
        }
    }
}

async fn run_pre_countdown(
    timer: CountdownTimer,
    generation: u64,
    mut stop_rx: mpsc::Receiver<()>,
    duration: Duration,
    deviation: Duration,
) {
    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                // A stop during the pre-countdown suppresses the transition
                // into the main countdown and emits no end event.
                let mut guard = timer.inner.lock().expect("countdown state poisoned");
                if guard.generation != generation {
                    return;
                }
                guard.phase = CountdownPhase::Idle;
                guard.pre_remaining_secs = 0;
                guard.stop_tx = None;
                info!("pre-countdown stopped");
                return;
            }
            _ = sleep(TICK) => {
                let (remaining, done) = {
                    let mut guard = timer.inner.lock().expect("countdown state poisoned");
                    if guard.generation != generation
                        || guard.phase != CountdownPhase::PreCountdown
                    {
                        return;
                    }
                    guard.pre_remaining_secs = guard.pre_remaining_secs.saturating_sub(1);
                    let remaining = guard.pre_remaining_secs;
                    let done = remaining == 0;
                    if done {
                        guard.phase = CountdownPhase::Idle;
                        guard.stop_tx = None;
                    }
                    (remaining, done)
                };
                let _ = timer.events.send(CountdownEvent::Tick {
                    phase: CountdownPhase::PreCountdown,
                    remaining: Duration::from_secs(remaining),
                });
                if done {
                    timer.start(duration, deviation);
                    return;
                }
            }
        }
    }
}
