//! Strip animation effects.
//!
//! Each effect renders one frame per tick into the shared color buffer and
//! reports whether it has run to natural completion. Effects are configured
//! through [`EffectBuilder`] and validated wholesale before activation.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::color::Rgb;

mod blink;
mod breathing;
mod fade_in;
mod fade_out;
mod off;
mod rainbow;
mod scanner;
mod solid;
mod strobe;
mod twinkle;

pub use blink::BlinkEffect;
pub use breathing::BreathingEffect;
pub use fade_in::FadeInEffect;
pub use fade_out::FadeOutEffect;
pub use off::OffEffect;
pub use rainbow::RainbowEffect;
pub use scanner::ScannerEffect;
pub use solid::SolidEffect;
pub use strobe::StrobeEffect;
pub use twinkle::TwinkleEffect;

/// A strip animation. Implementations render one frame per `apply` call;
/// the animator owns the tick cadence and cancellation.
pub trait Effect: Send {
    fn kind(&self) -> EffectKind;

    /// Delay between frames.
    fn speed(&self) -> Duration;

    fn set_speed(&mut self, speed: Duration);

    /// Reset transient state and size any per-LED scratch buffers.
    fn initialize(&mut self, led_count: usize);

    /// Render one frame. Returns true once the effect has run to completion
    /// and should stop.
    fn apply(&mut self, leds: &mut [Rgb]) -> bool;

    fn validate(&self) -> ValidationResult {
        ValidationResult::ok()
    }

    /// Independent copy preserving configuration but not animation progress.
    fn clone_box(&self) -> Box<dyn Effect>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl fmt::Debug for dyn Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect").field("kind", &self.kind()).finish()
    }
}

/// The closed set of effect kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    Off,
    Solid,
    Rainbow,
    Strobe,
    Blink,
    Scanner,
    FadeIn,
    FadeOut,
    Breathing,
    Twinkle,
}

impl EffectKind {
    pub fn all() -> &'static [EffectKind] {
        &[
            EffectKind::Off,
            EffectKind::Solid,
            EffectKind::Rainbow,
            EffectKind::Strobe,
            EffectKind::Blink,
            EffectKind::Scanner,
            EffectKind::FadeIn,
            EffectKind::FadeOut,
            EffectKind::Breathing,
            EffectKind::Twinkle,
        ]
    }

    /// Construct the default-configured effect for this kind.
    pub fn create(self) -> Box<dyn Effect> {
        match self {
            EffectKind::Off => Box::new(OffEffect::default()),
            EffectKind::Solid => Box::new(SolidEffect::default()),
            EffectKind::Rainbow => Box::new(RainbowEffect::default()),
            EffectKind::Strobe => Box::new(StrobeEffect::default()),
            EffectKind::Blink => Box::new(BlinkEffect::default()),
            EffectKind::Scanner => Box::new(ScannerEffect::default()),
            EffectKind::FadeIn => Box::new(FadeInEffect::default()),
            EffectKind::FadeOut => Box::new(FadeOutEffect::default()),
            EffectKind::Breathing => Box::new(BreathingEffect::default()),
            EffectKind::Twinkle => Box::new(TwinkleEffect::default()),
        }
    }

    pub fn info(self) -> &'static EffectInfo {
        EFFECT_INFO
            .get(&self)
            .expect("effect info registered for every kind")
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl FromStr for EffectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(EffectKind::Off),
            "solid" => Ok(EffectKind::Solid),
            "rainbow" => Ok(EffectKind::Rainbow),
            "strobe" => Ok(EffectKind::Strobe),
            "blink" => Ok(EffectKind::Blink),
            "scanner" => Ok(EffectKind::Scanner),
            "fadein" => Ok(EffectKind::FadeIn),
            "fadeout" => Ok(EffectKind::FadeOut),
            "breathing" => Ok(EffectKind::Breathing),
            "twinkle" => Ok(EffectKind::Twinkle),
            other => Err(format!("unknown effect '{other}'")),
        }
    }
}

/// Result of validating an effect configuration.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![error.into()],
        }
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(error.into());
    }

    pub fn into_result(self) -> Result<(), String> {
        if self.is_valid {
            Ok(())
        } else {
            Err(self.errors.join(", "))
        }
    }
}

/// Static descriptive metadata per effect kind.
#[derive(Debug, Clone)]
pub struct EffectInfo {
    pub required_colors: usize,
    pub optional_colors: usize,
    pub description: &'static str,
    pub default_speed: Duration,
    pub color_labels: &'static [&'static str],
}

static EFFECT_INFO: Lazy<HashMap<EffectKind, EffectInfo>> = Lazy::new(|| {
    let mut info = HashMap::new();
    info.insert(
        EffectKind::Off,
        EffectInfo {
            required_colors: 0,
            optional_colors: 0,
            description: "Turn off all LEDs",
            default_speed: Duration::from_millis(100),
            color_labels: &[],
        },
    );
    info.insert(
        EffectKind::Solid,
        EffectInfo {
            required_colors: 1,
            optional_colors: 0,
            description: "Solid color on all LEDs",
            default_speed: Duration::from_millis(100),
            color_labels: &["Color"],
        },
    );
    info.insert(
        EffectKind::Rainbow,
        EffectInfo {
            required_colors: 0,
            optional_colors: 0,
            description: "Animated rainbow across all LEDs",
            default_speed: Duration::from_millis(50),
            color_labels: &[],
        },
    );
    info.insert(
        EffectKind::Strobe,
        EffectInfo {
            required_colors: 1,
            optional_colors: 1,
            description: "Alternates between two colors",
            default_speed: Duration::from_millis(250),
            color_labels: &["Primary Color", "Secondary Color"],
        },
    );
    info.insert(
        EffectKind::Blink,
        EffectInfo {
            required_colors: 2,
            optional_colors: 0,
            description: "Alternates between two colors",
            default_speed: Duration::from_millis(500),
            color_labels: &["Color 1", "Color 2"],
        },
    );
    info.insert(
        EffectKind::Scanner,
        EffectInfo {
            required_colors: 1,
            optional_colors: 0,
            description: "Single LED moving back and forth",
            default_speed: Duration::from_millis(100),
            color_labels: &["Scanner Color"],
        },
    );
    info.insert(
        EffectKind::FadeIn,
        EffectInfo {
            required_colors: 1,
            optional_colors: 0,
            description: "Gradually fade in to specified color over a set duration",
            default_speed: Duration::from_millis(50),
            color_labels: &["Target Color"],
        },
    );
    info.insert(
        EffectKind::FadeOut,
        EffectInfo {
            required_colors: 1,
            optional_colors: 0,
            description: "Gradually fade out from specified color over a set duration",
            default_speed: Duration::from_millis(50),
            color_labels: &["Start Color"],
        },
    );
    info.insert(
        EffectKind::Breathing,
        EffectInfo {
            required_colors: 1,
            optional_colors: 0,
            description: "Breathing effect that fades between configurable minimum and maximum brightness",
            default_speed: Duration::from_millis(50),
            color_labels: &["Color"],
        },
    );
    info.insert(
        EffectKind::Twinkle,
        EffectInfo {
            required_colors: 1,
            optional_colors: 0,
            description: "Random twinkling effect with LEDs fading in and out independently",
            default_speed: Duration::from_millis(100),
            color_labels: &["Color"],
        },
    );
    info
});

pub(crate) fn fill(leds: &mut [Rgb], color: Rgb) {
    for led in leds.iter_mut() {
        *led = color;
    }
}

pub(crate) fn clear(leds: &mut [Rgb]) {
    fill(leds, Rgb::BLACK);
}

/// Fluent configuration front end for effects.
///
/// `build` constructs the effect, applies every configured parameter and
/// validates the result; an invalid configuration is rejected wholesale.
#[derive(Debug, Clone)]
pub struct EffectBuilder {
    kind: EffectKind,
    speed: Option<Duration>,
    colors: Vec<Rgb>,
    fade_duration: Option<Duration>,
    breath_duration: Option<Duration>,
    min_brightness: Option<f32>,
    max_brightness: Option<f32>,
    twinkle_probability: Option<f32>,
}

impl EffectBuilder {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            speed: None,
            colors: Vec::new(),
            fade_duration: None,
            breath_duration: None,
            min_brightness: None,
            max_brightness: None,
            twinkle_probability: None,
        }
    }

    pub fn with_speed(mut self, speed: Duration) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_speed_ms(self, millis: u64) -> Self {
        self.with_speed(Duration::from_millis(millis))
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.colors.push(color);
        self
    }

    pub fn with_colors(mut self, colors: &[Rgb]) -> Self {
        self.colors.extend_from_slice(colors);
        self
    }

    pub fn with_fade_duration(mut self, duration: Duration) -> Self {
        self.fade_duration = Some(duration);
        self
    }

    pub fn with_breath_duration(mut self, duration: Duration) -> Self {
        self.breath_duration = Some(duration);
        self
    }

    pub fn with_min_brightness(mut self, brightness: f32) -> Self {
        self.min_brightness = Some(brightness);
        self
    }

    pub fn with_max_brightness(mut self, brightness: f32) -> Self {
        self.max_brightness = Some(brightness);
        self
    }

    pub fn with_twinkle_probability(mut self, probability: f32) -> Self {
        self.twinkle_probability = Some(probability);
        self
    }

    pub fn build(self) -> Result<Box<dyn Effect>, String> {
        let mut effect: Box<dyn Effect> = match self.kind {
            EffectKind::Off => Box::new(OffEffect::default()),
            EffectKind::Solid => {
                let mut e = SolidEffect::default();
                if let Some(c) = self.colors.first() {
                    e.color = *c;
                }
                Box::new(e)
            }
            EffectKind::Rainbow => Box::new(RainbowEffect::default()),
            EffectKind::Strobe => {
                let mut e = StrobeEffect::default();
                if let Some(c) = self.colors.first() {
                    e.primary = *c;
                }
                if let Some(c) = self.colors.get(1) {
                    e.secondary = *c;
                }
                Box::new(e)
            }
            EffectKind::Blink => {
                let mut e = BlinkEffect::default();
                if let Some(c) = self.colors.first() {
                    e.color1 = *c;
                }
                if let Some(c) = self.colors.get(1) {
                    e.color2 = *c;
                }
                Box::new(e)
            }
            EffectKind::Scanner => {
                let mut e = ScannerEffect::default();
                if let Some(c) = self.colors.first() {
                    e.color = *c;
                }
                Box::new(e)
            }
            EffectKind::FadeIn => {
                let mut e = FadeInEffect::default();
                if let Some(c) = self.colors.first() {
                    e.target_color = *c;
                }
                if let Some(d) = self.fade_duration {
                    e.fade_duration = d;
                }
                Box::new(e)
            }
            EffectKind::FadeOut => {
                let mut e = FadeOutEffect::default();
                if let Some(c) = self.colors.first() {
                    e.start_color = *c;
                }
                if let Some(d) = self.fade_duration {
                    e.fade_duration = d;
                }
                Box::new(e)
            }
            EffectKind::Breathing => {
                let mut e = BreathingEffect::default();
                if let Some(c) = self.colors.first() {
                    e.color = *c;
                }
                if let Some(d) = self.breath_duration {
                    e.breath_duration = d;
                }
                if let Some(b) = self.min_brightness {
                    e.min_brightness = b;
                }
                if let Some(b) = self.max_brightness {
                    e.max_brightness = b;
                }
                Box::new(e)
            }
            EffectKind::Twinkle => {
                let mut e = TwinkleEffect::default();
                if let Some(c) = self.colors.first() {
                    e.color = *c;
                }
                if let Some(p) = self.twinkle_probability {
                    e.twinkle_probability = p;
                }
                if let Some(b) = self.min_brightness {
                    e.min_brightness = b;
                }
                if let Some(b) = self.max_brightness {
                    e.max_brightness = b;
                }
                Box::new(e)
            }
        };

        if let Some(speed) = self.speed {
            effect.set_speed(speed);
        }

        let validation = effect.validate();
        if !validation.is_valid {
            return Err(format!(
                "effect configuration is invalid: {}",
                validation.errors.join(", ")
            ));
        }

        Ok(effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitive() {
        assert_eq!("rainbow".parse::<EffectKind>().unwrap(), EffectKind::Rainbow);
        assert_eq!("FadeIn".parse::<EffectKind>().unwrap(), EffectKind::FadeIn);
        assert!("plasma".parse::<EffectKind>().is_err());
    }

    #[test]
    fn info_registered_for_every_kind() {
        for kind in EffectKind::all() {
            let info = kind.info();
            assert!(!info.description.is_empty());
            assert!(info.default_speed > Duration::ZERO);
        }
    }

    #[test]
    fn create_matches_kind() {
        for kind in EffectKind::all() {
            assert_eq!(kind.create().kind(), *kind);
        }
    }

    #[test]
    fn builder_applies_speed_and_colors() {
        let effect = EffectBuilder::new(EffectKind::Blink)
            .with_colors(&[Rgb::GREEN, Rgb::BLUE])
            .with_speed_ms(40)
            .build()
            .unwrap();
        assert_eq!(effect.kind(), EffectKind::Blink);
        assert_eq!(effect.speed(), Duration::from_millis(40));
    }

    #[test]
    fn builder_rejects_black_solid() {
        let err = EffectBuilder::new(EffectKind::Solid)
            .with_color(Rgb::BLACK)
            .build()
            .unwrap_err();
        assert!(err.contains("Color must be set"));
    }

    #[test]
    fn builder_rejects_bad_twinkle_config() {
        let err = EffectBuilder::new(EffectKind::Twinkle)
            .with_color(Rgb::WHITE)
            .with_twinkle_probability(1.5)
            .with_min_brightness(0.8)
            .with_max_brightness(0.2)
            .build()
            .unwrap_err();
        assert!(err.contains("Twinkle probability"));
        assert!(err.contains("Max brightness"));
    }

    #[test]
    fn clone_box_preserves_configuration() {
        let mut original = ScannerEffect::default();
        original.color = Rgb::GREEN;
        original.set_speed(Duration::from_millis(20));
        let mut leds = vec![Rgb::BLACK; 4];
        original.initialize(leds.len());
        original.apply(&mut leds);
        original.apply(&mut leds);

        let clone = original.clone_box();
        assert_eq!(clone.kind(), EffectKind::Scanner);
        assert_eq!(clone.speed(), Duration::from_millis(20));

        // Progress is not carried over: a fresh clone starts at LED 0.
        let mut clone = clone;
        clone.initialize(leds.len());
        let mut fresh = vec![Rgb::BLACK; 4];
        clone.apply(&mut fresh);
        assert_eq!(fresh[0], Rgb::GREEN);
    }
}
