use std::any::Any;
use std::time::Duration;

use super::{Effect, EffectKind};
use crate::color::{hsv_to_rgb, Rgb};

const STEP_DEGREES: usize = 4;

/// Rainbow spread across the strip, rotating by four degrees of hue per tick.
#[derive(Debug, Clone)]
pub struct RainbowEffect {
    speed: Duration,
    step: usize,
}

impl Default for RainbowEffect {
    fn default() -> Self {
        Self {
            speed: Duration::from_millis(50),
            step: 0,
        }
    }
}

impl Effect for RainbowEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Rainbow
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
        let count = leds.len();
        for (i, led) in leds.iter_mut().enumerate() {
            let hue = (i * 360 / count + self.step) % 360;
            *led = hsv_to_rgb(hue as f32, 1.0, 1.0);
        }
        self.step = (self.step + STEP_DEGREES) % 360;
        false
    }

    fn clone_box(&self) -> Box<dyn Effect> {
        Box::new(Self {
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
    fn hue_advances_four_degrees_per_tick() {
        let mut effect = RainbowEffect::default();
        let mut leds = vec![Rgb::BLACK; 6];
        effect.initialize(leds.len());

        for k in 0..10 {
            effect.apply(&mut leds);
            for (i, led) in leds.iter().enumerate() {
                let hue = ((i * 360 / leds.len() + k * STEP_DEGREES) % 360) as f32;
                assert_eq!(*led, hsv_to_rgb(hue, 1.0, 1.0), "led {i} at tick {k}");
            }
        }
    }

    #[test]
    fn step_wraps_at_full_circle() {
        let mut effect = RainbowEffect::default();
        let mut leds = vec![Rgb::BLACK; 1];
        effect.initialize(1);
        for _ in 0..90 {
            effect.apply(&mut leds);
        }
        // 90 ticks * 4 degrees = 360, back at the start.
        assert_eq!(effect.step, 0);
    }

    #[test]
    fn single_led_strip_is_valid() {
        let mut effect = RainbowEffect::default();
        let mut leds = vec![Rgb::BLACK; 1];
        effect.initialize(1);
        effect.apply(&mut leds);
        assert_eq!(leds[0], hsv_to_rgb(0.0, 1.0, 1.0));
    }
}
