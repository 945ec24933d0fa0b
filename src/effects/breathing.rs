use std::any::Any;
use std::time::{Duration, Instant};

use super::{fill, Effect, EffectKind, ValidationResult};
use crate::color::Rgb;

/// Brightness follows a triangular wave with period `2 * breath_duration`,
/// mapped into `[min_brightness, max_brightness]`.
#[derive(Debug, Clone)]
pub struct BreathingEffect {
    pub color: Rgb,
    pub breath_duration: Duration,
    pub min_brightness: f32,
    pub max_brightness: f32,
    speed: Duration,
    started: Instant,
}

impl Default for BreathingEffect {
    fn default() -> Self {
        Self {
            color: Rgb::RED,
            breath_duration: Duration::from_secs(2),
            min_brightness: 0.0,
            max_brightness: 1.0,
            speed: Duration::from_millis(50),
            started: Instant::now(),
        }
    }
}

impl Effect for BreathingEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Breathing
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
        let cycle_ms = self.breath_duration.as_millis() as f64 * 2.0;
        let elapsed_ms = self.started.elapsed().as_millis() as f64;
        let cycle_progress = (elapsed_ms % cycle_ms) / cycle_ms;

        // Rise for the first half of the cycle, fall for the second.
        let normalized = if cycle_progress < 0.5 {
            cycle_progress * 2.0
        } else {
            (1.0 - cycle_progress) * 2.0
        };
        let normalized = normalized as f32;

        let brightness = (self.min_brightness
            + normalized * (self.max_brightness - self.min_brightness))
            .clamp(self.min_brightness, self.max_brightness);

        fill(leds, self.color.scaled(brightness));
        false
    }

    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if self.color.is_black() {
            result.add_error("Color must be set");
        }
        if self.breath_duration.is_zero() {
            result.add_error("Breath duration must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.min_brightness) {
            result.add_error("Minimum brightness must be between 0 and 1");
        }
        if !(0.0..=1.0).contains(&self.max_brightness) {
            result.add_error("Maximum brightness must be between 0 and 1");
        }
        if self.min_brightness >= self.max_brightness {
            result.add_error("Minimum brightness must be less than maximum brightness");
        }
        result
    }

    fn clone_box(&self) -> Box<dyn Effect> {
        Box::new(Self {
            color: self.color,
            breath_duration: self.breath_duration,
            min_brightness: self.min_brightness,
            max_brightness: self.max_brightness,
            speed: self.speed,
            started: Instant::now(),
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
