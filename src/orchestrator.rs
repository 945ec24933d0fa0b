//! Maps countdown phase transitions to animator and broadcaster commands.
//!
//! Each phase event replaces the running effect and schedules a cancelable
//! delayed follow-up; a newer phase event always pre-empts a stale scheduled
//! transition from the previous phase.

use std::time::Duration;

use log::{info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::animator::Animator;
use crate::broadcaster::Broadcaster;
use crate::color::Rgb;
use crate::countdown::{CountdownEvent, CountdownTimer};
use crate::effects::{EffectBuilder, EffectKind};

const ARMED_COLOR: Rgb = Rgb::BLUE;
const COUNTDOWN_PRIMARY: Rgb = Rgb::GREEN;
const COUNTDOWN_SECONDARY: Rgb = Rgb::new(0.635, 1.0, 0.0);
const END_PRIMARY: Rgb = Rgb::RED;
const END_SECONDARY: Rgb = Rgb::new(1.0, 1.0, 0.0);

const FADE_SPEED: Duration = Duration::from_millis(50);
const BLINK_SPEED: Duration = Duration::from_millis(250);
const TWINKLE_SPEED: Duration = Duration::from_millis(100);
const FOLLOW_UP_DELAY: Duration = Duration::from_secs(5);

pub struct Orchestrator {
    animator: Animator,
    broadcaster: Broadcaster,
    timer: CountdownTimer,
}

/// Handle to stop the orchestrator loop.
pub struct OrchestratorHandle {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl OrchestratorHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.handle.await;
    }
}

impl Orchestrator {
    pub fn new(animator: Animator, broadcaster: Broadcaster, timer: CountdownTimer) -> Self {
        Self {
            animator,
            broadcaster,
            timer,
        }
    }

    pub fn spawn(self) -> OrchestratorHandle {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let handle = tokio::spawn(self.run(stop_rx));
        OrchestratorHandle { stop_tx, handle }
    }

    async fn run(self, mut stop_rx: mpsc::Receiver<()>) {
        let mut events = self.timer.subscribe();
        let mut pending: Option<mpsc::Sender<()>> = None;
        info!("orchestrator subscribed to countdown events");

        loop {
            tokio::select! {
                _ = stop_rx.recv() => break,
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event, &mut pending).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("orchestrator lagged behind countdown events, skipped {skipped}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        cancel_pending(&mut pending);
    }

    async fn handle_event(
        &self,
        event: CountdownEvent,
        pending: &mut Option<mpsc::Sender<()>>,
    ) {
        match event {
            CountdownEvent::PreCountdownStarted { duration } => {
                cancel_pending(pending);
                info!("pre-countdown started, arming fade-in");
                self.broadcaster.set_active(true);
                let result = self
                    .animator
                    .start_built(
                        EffectBuilder::new(EffectKind::FadeIn)
                            .with_color(ARMED_COLOR)
                            .with_fade_duration(duration)
                            .with_speed(FADE_SPEED),
                    )
                    .await;
                if let Err(err) = result {
                    warn!("failed to start fade-in: {err}");
                }
            }
            CountdownEvent::Started { .. } => {
                cancel_pending(pending);
                info!("countdown started, switching to countdown blink");
                self.broadcaster.set_active(true);
                let result = self
                    .animator
                    .start_built(
                        EffectBuilder::new(EffectKind::Blink)
                            .with_colors(&[COUNTDOWN_PRIMARY, COUNTDOWN_SECONDARY])
                            .with_speed(BLINK_SPEED),
                    )
                    .await;
                if let Err(err) = result {
                    warn!("failed to start countdown blink: {err}");
                }
                *pending = Some(self.schedule_running_follow_up());
            }
            CountdownEvent::Tick { .. } => {}
            CountdownEvent::Ended => {
                cancel_pending(pending);
                info!("countdown ended, switching to end blink");
                let result = self
                    .animator
                    .start_built(
                        EffectBuilder::new(EffectKind::Blink)
                            .with_colors(&[END_PRIMARY, END_SECONDARY])
                            .with_speed(BLINK_SPEED),
                    )
                    .await;
                if let Err(err) = result {
                    warn!("failed to start end blink: {err}");
                }
                *pending = Some(self.schedule_end_follow_up());
            }
        }
    }

    /// After a fixed delay, calm the display down to a twinkle, but only if
    /// the countdown is still running by then.
    fn schedule_running_follow_up(&self) -> mpsc::Sender<()> {
        let (cancel_tx, mut cancel_rx) = mpsc::channel(1);
        let animator = self.animator.clone();
        let timer = self.timer.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx.recv() => {}
                _ = sleep(FOLLOW_UP_DELAY) => {
                    if timer.is_running() {
                        info!("switching to twinkle for the running phase");
                        let result = animator
                            .start_built(
                                EffectBuilder::new(EffectKind::Twinkle)
                                    .with_color(COUNTDOWN_PRIMARY)
                                    .with_speed(TWINKLE_SPEED),
                            )
                            .await;
                        if let Err(err) = result {
                            warn!("failed to start twinkle: {err}");
                        }
                    }
                }
            }
        });
        cancel_tx
    }

    /// After a fixed delay, clear the strip and deactivate broadcasting.
    fn schedule_end_follow_up(&self) -> mpsc::Sender<()> {
        let (cancel_tx, mut cancel_rx) = mpsc::channel(1);
        let animator = self.animator.clone();
        let broadcaster = self.broadcaster.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx.recv() => {}
                _ = sleep(FOLLOW_UP_DELAY) => {
                    info!("end display finished, deactivating broadcast");
                    animator.stop().await;
                    broadcaster.set_active(false);
                }
            }
        });
        cancel_tx
    }
}

fn cancel_pending(pending: &mut Option<mpsc::Sender<()>>) {
    if let Some(tx) = pending.take() {
        let _ = tx.try_send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wledlink::{Targets, WledSender};

    async fn test_broadcaster(animator: &Animator) -> Broadcaster {
        let sender = Arc::new(
            WledSender::bind(Targets::new(Vec::new()))
                .await
                .expect("bind test sender"),
        );
        Broadcaster::new(animator.clone(), sender, Duration::from_millis(16), 1)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool, what: &str) {
        for _ in 0..2000 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {what}");
    }

    #[tokio::test(start_paused = true)]
    async fn full_phase_sequence_drives_effects() {
        let animator = Animator::new(4);
        let broadcaster = test_broadcaster(&animator).await;
        let timer = CountdownTimer::new();
        let handle =
            Orchestrator::new(animator.clone(), broadcaster.clone(), timer.clone()).spawn();

        timer.start_with_pre_countdown(
            Duration::from_secs(2),
            Duration::from_secs(3),
            Duration::ZERO,
        );

        let a = animator.clone();
        wait_for(|| a.current_effect() == EffectKind::FadeIn, "fade-in").await;
        assert!(broadcaster.is_active());

        let a = animator.clone();
        wait_for(|| a.current_effect() == EffectKind::Blink, "countdown blink").await;

        // The 3 s countdown expires before the 5 s follow-up delay, so the
        // twinkle transition must never fire; the end follow-up clears the
        // strip and deactivates broadcasting instead.
        let b = broadcaster.clone();
        wait_for(|| !b.is_active(), "broadcast deactivation").await;
        assert_ne!(animator.current_effect(), EffectKind::Twinkle);
        assert!(animator.snapshot().iter().all(|byte| *byte == 0));

        handle.stop().await;
        animator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn long_countdown_calms_down_to_twinkle() {
        let animator = Animator::new(4);
        let broadcaster = test_broadcaster(&animator).await;
        let timer = CountdownTimer::new();
        let handle =
            Orchestrator::new(animator.clone(), broadcaster.clone(), timer.clone()).spawn();

        timer.start(Duration::from_secs(60), Duration::ZERO);

        let a = animator.clone();
        wait_for(|| a.current_effect() == EffectKind::Blink, "countdown blink").await;
        let a = animator.clone();
        wait_for(|| a.current_effect() == EffectKind::Twinkle, "twinkle").await;
        assert!(timer.is_running());

        timer.stop();
        handle.stop().await;
        animator.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn end_event_pre_empts_stale_running_follow_up() {
        let animator = Animator::new(4);
        let broadcaster = test_broadcaster(&animator).await;
        let timer = CountdownTimer::new();
        let handle =
            Orchestrator::new(animator.clone(), broadcaster.clone(), timer.clone()).spawn();

        timer.start(Duration::from_secs(60), Duration::ZERO);
        let a = animator.clone();
        wait_for(|| a.current_effect() == EffectKind::Blink, "countdown blink").await;

        // Stop right away: the pending twinkle transition must be replaced by
        // the end sequence.
        timer.stop();
        let b = broadcaster.clone();
        wait_for(|| !b.is_active(), "broadcast deactivation").await;

        sleep(Duration::from_secs(10)).await;
        assert_ne!(animator.current_effect(), EffectKind::Twinkle);
        assert!(animator.snapshot().iter().all(|byte| *byte == 0));

        handle.stop().await;
        animator.stop().await;
    }
}
