use std::any::Any;
use std::time::Duration;

use super::{clear, Effect, EffectKind, ValidationResult};
use crate::color::Rgb;

/// A single lit LED sweeping from one end of the strip to the other and back.
#[derive(Debug, Clone)]
pub struct ScannerEffect {
    pub color: Rgb,
    speed: Duration,
    step: i32,
    direction: i32,
}

impl Default for ScannerEffect {
    fn default() -> Self {
        Self {
            color: Rgb::RED,
            speed: Duration::from_millis(100),
            step: 0,
            direction: 1,
        }
    }
}

impl Effect for ScannerEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Scanner
    }

    fn speed(&self) -> Duration {
        self.speed
    }

    fn set_speed(&mut self, speed: Duration) {
        self.speed = speed;
    }

    fn initialize(&mut self, _led_count: usize) {
        self.step = 0;
        self.direction = 1;
    }

    fn apply(&mut self, leds: &mut [Rgb]) -> bool {
        clear(leds);

        let count = leds.len() as i32;
        let pos = self.step.rem_euclid(count) as usize;
        leds[pos] = self.color;

        self.step += self.direction;
        if self.step >= count - 1 {
            self.direction = -1;
        } else if self.step <= 0 {
            self.direction = 1;
        }

        false
    }

    fn validate(&self) -> ValidationResult {
        if self.color.is_black() {
            return ValidationResult::fail("Color must be set");
        }
        ValidationResult::ok()
    }

    fn clone_box(&self) -> Box<dyn Effect> {
        Box::new(Self {
            color: self.color,
            speed: self.speed,
            step: 0,
            direction: 1,
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_index(leds: &[Rgb]) -> usize {
        leds.iter().position(|led| !led.is_black()).unwrap()
    }

    #[test]
    fn sweeps_to_the_end_and_back() {
        let mut effect = ScannerEffect::default();
        let mut leds = vec![Rgb::BLACK; 4];
        effect.initialize(leds.len());

        let mut positions = Vec::new();
        for _ in 0..7 {
            effect.apply(&mut leds);
            positions.push(lit_index(&leds));
        }
        assert_eq!(positions, vec![0, 1, 2, 3, 2, 1, 0]);
    }

    #[test]
    fn only_one_led_lit_per_tick() {
        let mut effect = ScannerEffect::default();
        let mut leds = vec![Rgb::BLACK; 8];
        effect.initialize(leds.len());
        for _ in 0..20 {
            effect.apply(&mut leds);
            assert_eq!(leds.iter().filter(|led| !led.is_black()).count(), 1);
        }
    }
}
