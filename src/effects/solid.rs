use std::any::Any;
use std::time::Duration;

use super::{fill, Effect, EffectKind, ValidationResult};
use crate::color::Rgb;

#[derive(Debug, Clone)]
pub struct SolidEffect {
    pub color: Rgb,
    speed: Duration,
}

impl Default for SolidEffect {
    fn default() -> Self {
        Self {
            color: Rgb::RED,
            speed: Duration::from_millis(100),
        }
    }
}

impl Effect for SolidEffect {
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
        fill(leds, self.color);
        false
    }

    fn validate(&self) -> ValidationResult {
        if self.color.is_black() {
            return ValidationResult::fail("Color must be set");
        }
        ValidationResult::ok()
    }

    fn clone_box(&self) -> Box<dyn Effect> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
