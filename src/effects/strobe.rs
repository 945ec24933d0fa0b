use std::any::Any;
use std::time::Duration;

use super::{fill, Effect, EffectKind, ValidationResult};
use crate::color::Rgb;

/// Alternates the whole strip between a primary and a secondary color,
/// leading with the secondary.
#[derive(Debug, Clone)]
pub struct StrobeEffect {
    pub primary: Rgb,
    pub secondary: Rgb,
    speed: Duration,
    step: u8,
}

impl Default for StrobeEffect {
    fn default() -> Self {
        Self {
            primary: Rgb::RED,
            secondary: Rgb::GREEN,
            speed: Duration::from_millis(250),
            step: 0,
        }
    }
}

impl Effect for StrobeEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Strobe
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
            self.secondary
        } else {
            self.primary
        };
        fill(leds, color);
        self.step = (self.step + 1) % 2;
        false
    }

    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if self.primary.is_black() {
            result.add_error("Primary color must be set");
        }
        result
    }

    fn clone_box(&self) -> Box<dyn Effect> {
        Box::new(Self {
            primary: self.primary,
            secondary: self.secondary,
            speed: self.speed,
            step: 0,
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternates_starting_with_secondary() {
        let mut effect = StrobeEffect::default();
        let mut leds = vec![Rgb::BLACK; 3];
        effect.initialize(leds.len());

        effect.apply(&mut leds);
        assert!(leds.iter().all(|led| *led == effect.secondary));
        effect.apply(&mut leds);
        assert!(leds.iter().all(|led| *led == effect.primary));
        effect.apply(&mut leds);
        assert!(leds.iter().all(|led| *led == effect.secondary));
    }
}
