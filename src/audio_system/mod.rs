/// Audio system module
///
/// Player assets and the voice engine behind them:
/// - Clip selection, singleton arbitration and live parameter links per player
/// - A shared, recycling voice pool with generation-checked keys
/// - Non-blocking fades driven by the context clock
///
/// ## Architecture
///
/// ```text
/// AudioContext<B: VoiceBackend>
///   ├── VoicePool        (free list, expiry, tracked anchors)
///   ├── FadeController   (linear ramps)
///   ├── SaveKeyRegistry + PreferenceStore
///   ├── MixerGroups
///   └── EventBus
///
/// AudioPlayer (one per asset, owned by the caller)
///   ├── clips + PlayerSettings
///   └── id -> VoiceKey map, singleton handle
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let mut ctx = AudioContext::new(DeviceBackend::open()?);
/// let mut steps = PlayerAsset::load_player("assets/steps.json")?;
/// steps.enable(&mut ctx);
///
/// let handle = steps.play(&mut ctx, "step_01", PlayOptions::new().at([0.0, 0.0, 2.0]))?;
///
/// loop {
///     ctx.update(frame_time);
///     if !handle.is_playing(&steps, &ctx) {
///         break;
///     }
/// }
/// ```
pub mod anchor;
pub mod asset;
pub mod context;
pub mod fade;
pub mod handle;
pub mod mixer;
pub mod player;
pub mod pool;
pub mod settings;

// Re-export commonly used types
pub use anchor::{Anchor, TrackedTransform};
pub use asset::PlayerAsset;
pub use context::AudioContext;
pub use fade::{FadeController, FadeKind};
pub use handle::{AudioHandle, HandleKey, PlayerId};
pub use mixer::{MixerGroup, MixerGroups};
pub use player::{AudioPlayer, ClipSelector, PlayOptions};
pub use pool::{Reclaimed, SlotState, VoiceKey, VoicePool};
pub use settings::{LiveLinks, PlayerSettings, SaveFlags};
