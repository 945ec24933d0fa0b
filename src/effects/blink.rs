use std::any::Any;
use std::time::Duration;

use super::{fill, Effect, EffectKind, ValidationResult};
use crate::color::Rgb;

/// Alternates the whole strip between two colors, leading with the first.
#[derive(Debug, Clone)]
pub struct BlinkEffect {
    pub color1: Rgb,
    pub color2: Rgb,
    speed: Duration,
    step: u64,
}

impl Default for BlinkEffect {
    fn default() -> Self {
        Self {
            color1: Rgb::RED,
            color2: Rgb::BLUE,
            speed: Duration::from_millis(500),
            step: 0,
        }
    }
}

impl Effect for BlinkEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Blink
    }

    fn speed(&self) -> Duration {
        self.speed
    }

    fn set_speed(&mut self, speed: Duration) {
        self.speed = speed;
    }

    fn initialize(&mut self, _led_count: usize) {
        self.step = 0;
    }

    fn apply(&mut self, leds: &mut [Rgb]) -> bool {
        let color = if self.step % 2 == 0 {
            self.color1
        } else {
            self.color2
        };
        fill(leds, color);
        self.step = self.step.wrapping_add(1);
        false
    }

    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if self.color1.is_black() {
            result.add_error("Color 1 must be set to a non-black color");
        }
        if self.color2.is_black() {
            result.add_error("Color 2 must be set to a non-black color");
        }
        result
    }

    fn clone_box(&self) -> Box<dyn Effect> {
        Box::new(Self {
            color1: self.color1,
            color2: self.color2,
            speed: self.speed,
            step: 0,
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
