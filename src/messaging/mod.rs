/// Messaging module
///
/// Playback events flow one way, from the engine to subscribers:
///
/// ```text
/// ┌──────────────┐   PlaybackEvent   ┌─────────────┐   channel   ┌──────────────┐
/// │ AudioContext │ ────────────────> │  Event Bus  │ ──────────> │ Subscribers  │
/// │ AudioPlayer  │                   │             │             │ (monitor,..) │
/// └──────────────┘                   └─────────────┘             └──────────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let (rx, _id) = ctx.events().subscribe();
/// let handle = player.play(&mut ctx, "door", PlayOptions::default())?;
///
/// while let Ok(event) = rx.try_recv() {
///     match event {
///         PlaybackEvent::Played { handle, .. } => { /* ... */ }
///         _ => {}
///     }
/// }
/// ```

pub mod bus;
pub mod events;

pub use bus::{EventBus, SubscriberId};
pub use events::PlaybackEvent;
