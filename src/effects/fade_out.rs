use std::any::Any;
use std::time::{Duration, Instant};

use super::{clear, fill, Effect, EffectKind, ValidationResult};
use crate::color::Rgb;

/// Linear fade from the start color down to black, completing with a cleared
/// strip.
#[derive(Debug, Clone)]
pub struct FadeOutEffect {
    pub start_color: Rgb,
    pub fade_duration: Duration,
    speed: Duration,
    started: Instant,
}

impl Default for FadeOutEffect {
    fn default() -> Self {
        Self {
            start_color: Rgb::RED,
            fade_duration: Duration::from_secs(2),
            speed: Duration::from_millis(50),
            started: Instant::now(),
        }
    }
}

impl Effect for FadeOutEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::FadeOut
    }

    fn speed(&self) -> Duration {
        self.speed
    }

    fn set_speed(&mut self, speed: Duration) {
        self.speed = speed;
    }

    fn initialize(&mut self, _led_count: usize) {
        self.started = Instant::now();
    }

    fn apply(&mut self, leds: &mut [Rgb]) -> bool {
        let elapsed = self.started.elapsed();

        if elapsed >= self.fade_duration {
            clear(leds);
            return true;
        }

        let progress = elapsed.as_secs_f32() / self.fade_duration.as_secs_f32();
        let brightness = (1.0 - progress).clamp(0.0, 1.0);
        fill(leds, self.start_color.scaled(brightness));
        false
    }

    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if self.start_color.is_black() {
            result.add_error("Start color must be set");
        }
        if self.fade_duration.is_zero() {
            result.add_error("Fade duration must be greater than zero");
        }
        result
    }

    fn clone_box(&self) -> Box<dyn Effect> {
        Box::new(Self {
            start_color: self.start_color,
            fade_duration: self.fade_duration,
            speed: self.speed,
            started: Instant::now(),
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
