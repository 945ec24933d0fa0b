pub mod animator;
pub mod broadcaster;
pub mod color;
pub mod countdown;
pub mod effects;
pub mod orchestrator;
pub mod settings;

pub use animator::Animator;
pub use broadcaster::{BroadcastHandle, Broadcaster, FramePipeline};
pub use color::Rgb;
pub use countdown::{CountdownEvent, CountdownPhase, CountdownStatus, CountdownTimer};
pub use effects::{Effect, EffectBuilder, EffectInfo, EffectKind, ValidationResult};
pub use orchestrator::{Orchestrator, OrchestratorHandle};
pub use settings::Settings;
