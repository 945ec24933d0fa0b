use std::any::Any;
use std::time::Duration;

use super::{clear, Effect, EffectKind};
use crate::color::Rgb;

/// Clears the strip and completes immediately.
#[derive(Debug, Clone)]
pub struct OffEffect {
    speed: Duration,
}

impl Default for OffEffect {
    fn default() -> Self {
        Self {
            speed: Duration::from_millis(100),
        }
    }
}

impl Effect for OffEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Off
    }

    fn speed(&self) -> Duration {
        self.speed
    }

    fn set_speed(&mut self, speed: Duration) {
        self.speed = speed;
    }

    fn initialize(&mut self, _led_count: usize) {}

    fn apply(&mut self, leds: &mut [Rgb]) -> bool {
        clear(leds);
        true
    }

    fn clone_box(&self) -> Box<dyn Effect> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
