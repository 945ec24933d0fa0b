//! Effect execution engine.
//!
//! Owns the color buffer and the currently active effect. Effect changes go
//! through a cancel-and-swap protocol: the running loop is signalled, awaited
//! and released before the replacement is installed, so at most one loop ever
//! mutates the buffer. Readers only see the buffer through byte-copy
//! snapshots.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::info;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::color::Rgb;
use crate::effects::{Effect, EffectBuilder, EffectKind};

const DEFAULT_SPEED: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct Animator {
    inner: Arc<Mutex<AnimatorInner>>,
    updates: Arc<watch::Sender<u64>>,
}

struct ActiveLoop {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

struct AnimatorInner {
    leds: Vec<Rgb>,
    effect: Option<Box<dyn Effect>>,
    active: Option<ActiveLoop>,
    generation: u64,
    frames: u64,
}

impl Animator {
    pub fn new(led_count: usize) -> Self {
        info!("animator initialized with {led_count} LEDs");
        Self {
            inner: Arc::new(Mutex::new(AnimatorInner {
                leds: vec![Rgb::BLACK; led_count],
                effect: None,
                active: None,
                generation: 0,
                frames: 0,
            })),
            updates: Arc::new(watch::channel(0).0),
        }
    }

    /// Receiver for the frame counter, bumped on every buffer update.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    pub fn led_count(&self) -> usize {
        self.inner.lock().expect("animator state poisoned").leds.len()
    }

    pub fn current_effect(&self) -> EffectKind {
        self.inner
            .lock()
            .expect("animator state poisoned")
            .effect
            .as_ref()
            .map(|e| e.kind())
            .unwrap_or(EffectKind::Off)
    }

    pub fn speed(&self) -> Duration {
        self.inner
            .lock()
            .expect("animator state poisoned")
            .effect
            .as_ref()
            .map(|e| e.speed())
            .unwrap_or(DEFAULT_SPEED)
    }

    /// Validate and start an effect, replacing whichever one is running.
    ///
    /// A failed validation rejects the activation wholesale and leaves the
    /// previous effect untouched.
    pub async fn start_effect(&self, mut effect: Box<dyn Effect>) -> Result<(), String> {
        let validation = effect.validate();
        if !validation.is_valid {
            return Err(format!(
                "effect validation failed: {}",
                validation.errors.join(", ")
            ));
        }

        self.cancel_current().await;

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let mut guard = self.inner.lock().expect("animator state poisoned");
        guard.generation += 1;
        let generation = guard.generation;
        effect.initialize(guard.leds.len());
        info!(
            "started effect {} with speed {}ms",
            effect.kind(),
            effect.speed().as_millis()
        );
        guard.effect = Some(effect);
        let handle = tokio::spawn(run_effect_loop(
            self.inner.clone(),
            self.updates.clone(),
            generation,
            stop_rx,
        ));
        guard.active = Some(ActiveLoop { stop_tx, handle });
        Ok(())
    }

    /// Start the default-configured effect of a kind.
    pub async fn start_kind(&self, kind: EffectKind) -> Result<(), String> {
        self.start_effect(kind.create()).await
    }

    /// Build an effect from a builder and start it.
    pub async fn start_built(&self, builder: EffectBuilder) -> Result<(), String> {
        self.start_effect(builder.build()?).await
    }

    /// Cancel the active loop, wait for it to terminate and clear the strip.
    pub async fn stop(&self) {
        self.cancel_current().await;
        let frame = {
            let mut guard = self.inner.lock().expect("animator state poisoned");
            for led in guard.leds.iter_mut() {
                *led = Rgb::BLACK;
            }
            guard.frames += 1;
            guard.frames
        };
        self.updates.send_replace(frame);
        info!("stopped effect");
    }

    /// Update the active effect's inter-frame delay without interrupting it.
    pub fn set_speed(&self, speed: Duration) {
        let mut guard = self.inner.lock().expect("animator state poisoned");
        if let Some(effect) = guard.effect.as_mut() {
            effect.set_speed(speed);
            info!("effect speed set to {}ms", speed.as_millis());
        }
    }

    /// Apply an in-place parameter change to the active effect.
    pub fn update_effect<F>(&self, update: F)
    where
        F: FnOnce(&mut dyn Effect),
    {
        let mut guard = self.inner.lock().expect("animator state poisoned");
        if let Some(effect) = guard.effect.as_mut() {
            update(effect.as_mut());
        }
    }

    /// Resize the strip, preserving existing entries by index and zero-filling
    /// new slots. The active effect is re-initialized for the new length.
    pub fn set_led_count(&self, count: usize) -> Result<(), String> {
        if count == 0 {
            return Err("led count must be positive".into());
        }
        let mut guard = self.inner.lock().expect("animator state poisoned");
        guard.leds.resize(count, Rgb::BLACK);
        if let Some(effect) = guard.effect.as_mut() {
            effect.initialize(count);
        }
        info!("led count set to {count}");
        Ok(())
    }

    /// Copy the buffer into `dest` as packed RGB byte triples. Returns the
    /// number of bytes written.
    pub fn copy_to(&self, dest: &mut [u8]) -> Result<usize, String> {
        let guard = self.inner.lock().expect("animator state poisoned");
        let required = guard.leds.len() * 3;
        if dest.len() < required {
            return Err(format!(
                "destination buffer too small: required {required} bytes, got {}",
                dest.len()
            ));
        }
        for (i, led) in guard.leds.iter().enumerate() {
            dest[i * 3..i * 3 + 3].copy_from_slice(&led.to_bytes());
        }
        Ok(required)
    }

    /// Byte-copy snapshot of the whole buffer.
    pub fn snapshot(&self) -> Vec<u8> {
        let guard = self.inner.lock().expect("animator state poisoned");
        guard.leds.iter().flat_map(|led| led.to_bytes()).collect()
    }

    async fn cancel_current(&self) {
        let active = {
            let mut guard = self.inner.lock().expect("animator state poisoned");
            guard.active.take()
        };
        if let Some(active) = active {
            let _ = active.stop_tx.send(()).await;
            let _ = active.handle.await;
        }
    }
}

async fn run_effect_loop(
    inner: Arc<Mutex<AnimatorInner>>,
    updates: Arc<watch::Sender<u64>>,
    generation: u64,
    mut stop_rx: mpsc::Receiver<()>,
) {
    loop {
        let (completed, delay, frame) = {
            let mut guard = inner.lock().expect("animator state poisoned");
            if guard.generation != generation {
                return;
            }
            let state = &mut *guard;
            let effect = match state.effect.as_mut() {
                Some(effect) => effect,
                None => return,
            };
            let completed = effect.apply(&mut state.leds);
            let delay = effect.speed();
            state.frames += 1;
            (completed, delay, state.frames)
        };

        updates.send_replace(frame);

        if completed {
            // Leave the final frame visible.
            return;
        }

        tokio::select! {
            _ = stop_rx.recv() => {
                clear_on_cancel(&inner, &updates, generation);
                return;
            }
            _ = sleep(delay) => {}
        }
    }
}

fn clear_on_cancel(
    inner: &Arc<Mutex<AnimatorInner>>,
    updates: &Arc<watch::Sender<u64>>,
    generation: u64,
) {
    let frame = {
        let mut guard = inner.lock().expect("animator state poisoned");
        if guard.generation != generation {
            return;
        }
        for led in guard.leds.iter_mut() {
            *led = Rgb::BLACK;
        }
        guard.frames += 1;
        guard.frames
    };
    updates.send_replace(frame);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts in-flight `apply` calls so overlapping loops would be caught.
    struct ProbeEffect {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        applies: Arc<AtomicUsize>,
        speed: Duration,
    }

    impl Effect for ProbeEffect {
        fn kind(&self) -> EffectKind {
            EffectKind::Solid
        }

        fn speed(&self) -> Duration {
            self.speed
        }

        fn set_speed(&mut self, speed: Duration) {
            self.speed = speed;
        }

        fn initialize(&mut self, _led_count: usize) {}

        fn apply(&mut self, leds: &mut [Rgb]) -> bool {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            for led in leds.iter_mut() {
                *led = Rgb::WHITE;
            }
            self.applies.fetch_add(1, Ordering::SeqCst);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            false
        }

        fn clone_box(&self) -> Box<dyn Effect> {
            unimplemented!("probe effects are not cloned")
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn immediate_restart_never_overlaps_loops() {
        let animator = Animator::new(8);
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let applies = Arc::new(AtomicUsize::new(0));
        let shared_in_flight = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let effect = Box::new(ProbeEffect {
                in_flight: shared_in_flight.clone(),
                max_in_flight: max_in_flight.clone(),
                applies: applies.clone(),
                speed: Duration::from_millis(1),
            });
            animator.start_effect(effect).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(30)).await;
        animator.stop().await;

        assert!(applies.load(Ordering::SeqCst) > 0);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_clears_the_buffer() {
        let animator = Animator::new(5);
        animator.start_kind(EffectKind::Rainbow).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(animator.snapshot().iter().any(|b| *b != 0));

        animator.stop().await;
        assert!(animator.snapshot().iter().all(|b| *b == 0));
    }

    #[tokio::test]
    async fn failed_validation_leaves_previous_effect_running() {
        let animator = Animator::new(3);
        animator
            .start_built(EffectBuilder::new(EffectKind::Solid).with_color(Rgb::GREEN))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = animator
            .start_built(EffectBuilder::new(EffectKind::Solid).with_color(Rgb::BLACK))
            .await
            .unwrap_err();
        assert!(err.contains("validation failed"));
        assert_eq!(animator.current_effect(), EffectKind::Solid);
        assert_eq!(animator.snapshot(), vec![0, 255, 0, 0, 255, 0, 0, 255, 0]);

        animator.stop().await;
    }

    #[tokio::test]
    async fn completed_effect_keeps_final_frame() {
        let animator = Animator::new(3);
        animator
            .start_built(
                EffectBuilder::new(EffectKind::FadeIn)
                    .with_color(Rgb::RED)
                    .with_fade_duration(Duration::from_millis(1))
                    .with_speed_ms(1),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(animator.snapshot(), vec![255, 0, 0, 255, 0, 0, 255, 0, 0]);
        assert_eq!(animator.current_effect(), EffectKind::FadeIn);
    }

    #[tokio::test]
    async fn resize_preserves_prefix_and_zero_fills() {
        let animator = Animator::new(3);
        animator
            .start_built(
                EffectBuilder::new(EffectKind::FadeIn)
                    .with_color(Rgb::RED)
                    .with_fade_duration(Duration::from_millis(1))
                    .with_speed_ms(1),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        animator.set_led_count(5).unwrap();
        assert_eq!(animator.led_count(), 5);
        assert_eq!(
            animator.snapshot(),
            vec![255, 0, 0, 255, 0, 0, 255, 0, 0, 0, 0, 0, 0, 0, 0]
        );

        animator.set_led_count(2).unwrap();
        assert_eq!(animator.snapshot(), vec![255, 0, 0, 255, 0, 0]);
    }

    #[tokio::test]
    async fn zero_led_count_is_rejected() {
        let animator = Animator::new(4);
        assert!(animator.set_led_count(0).is_err());
        assert_eq!(animator.led_count(), 4);
    }

    #[tokio::test]
    async fn set_speed_applies_without_restart() {
        let animator = Animator::new(2);
        animator.start_kind(EffectKind::Rainbow).await.unwrap();
        animator.set_speed(Duration::from_millis(5));
        assert_eq!(animator.speed(), Duration::from_millis(5));
        animator.stop().await;
    }

    #[tokio::test]
    async fn copy_to_rejects_short_destination() {
        let animator = Animator::new(4);
        let mut buf = [0u8; 5];
        assert!(animator.copy_to(&mut buf).is_err());
        let mut buf = [0u8; 12];
        assert_eq!(animator.copy_to(&mut buf).unwrap(), 12);
    }
}
