use std::any::Any;
use std::time::Duration;

use rand::Rng;

use super::{Effect, EffectKind, ValidationResult};
use crate::color::Rgb;

/// Relaxation factor for LEDs drifting toward their random target.
const RELAXATION: f32 = 0.05;

/// Each LED independently either jumps to a new random brightness or drifts
/// toward a slowly changing random target.
#[derive(Debug, Clone)]
pub struct TwinkleEffect {
    pub color: Rgb,
    pub twinkle_probability: f32,
    pub min_brightness: f32,
    pub max_brightness: f32,
    speed: Duration,
    brightness: Vec<f32>,
}

impl Default for TwinkleEffect {
    fn default() -> Self {
        Self {
            color: Rgb::WHITE,
            twinkle_probability: 0.1,
            min_brightness: 0.0,
            max_brightness: 1.0,
            speed: Duration::from_millis(100),
            brightness: Vec::new(),
        }
    }
}

impl TwinkleEffect {
    fn random_brightness(&self, rng: &mut impl Rng) -> f32 {
        rng.gen::<f32>() * (self.max_brightness - self.min_brightness) + self.min_brightness
    }
}

impl Effect for TwinkleEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Twinkle
    }

    fn speed(&self) -> Duration {
        self.speed
    }

    fn set_speed(&mut self, speed: Duration) {
        self.speed = speed;
    }

    fn initialize(&mut self, led_count: usize) {
        let mut rng = rand::thread_rng();
        self.brightness = (0..led_count)
            .map(|_| {
                rng.gen::<f32>() * (self.max_brightness - self.min_brightness)
                    + self.min_brightness
            })
            .collect();
    }

    fn apply(&mut self, leds: &mut [Rgb]) -> bool {
        if self.brightness.len() != leds.len() {
            self.initialize(leds.len());
        }

        let mut rng = rand::thread_rng();
        for (i, led) in leds.iter_mut().enumerate() {
            if rng.gen::<f32>() < self.twinkle_probability {
                self.brightness[i] = self.random_brightness(&mut rng);
            } else {
                let target = self.random_brightness(&mut rng);
                self.brightness[i] += (target - self.brightness[i]) * RELAXATION;
            }

            self.brightness[i] = self.brightness[i].clamp(self.min_brightness, self.max_brightness);
            *led = self.color.scaled(self.brightness[i]);
        }

        false
    }

    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if self.color.is_black() {
            result.add_error("Color must be set");
        }
        if !(0.0..=1.0).contains(&self.twinkle_probability) {
            result.add_error("Twinkle probability must be between 0 and 1");
        }
        if self.max_brightness <= self.min_brightness {
            result.add_error("Max brightness must be greater than min brightness");
        }
        result
    }

    fn clone_box(&self) -> Box<dyn Effect> {
        Box::new(Self {
            color: self.color,
            twinkle_probability: self.twinkle_probability,
            min_brightness: self.min_brightness,
            max_brightness: self.max_brightness,
            speed: self.speed,
            brightness: Vec::new(),
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
    fn scratch_buffer_tracks_led_count() {
        let mut effect = TwinkleEffect::default();
        let mut leds = vec![Rgb::BLACK; 5];
        effect.apply(&mut leds);
        assert_eq!(effect.brightness.len(), 5);

        let mut leds = vec![Rgb::BLACK; 9];
        effect.apply(&mut leds);
        assert_eq!(effect.brightness.len(), 9);
    }

    #[test]
    fn output_respects_brightness_bounds() {
        let mut effect = TwinkleEffect {
            color: Rgb::WHITE,
            min_brightness: 0.3,
            max_brightness: 0.7,
            ..Default::default()
        };
        let mut leds = vec![Rgb::BLACK; 16];
        effect.initialize(leds.len());

        for _ in 0..50 {
            effect.apply(&mut leds);
            for led in &leds {
                assert!(led.r >= 0.3 - 1e-3 && led.r <= 0.7 + 1e-3);
            }
        }
    }
}
