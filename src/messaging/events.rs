/// Playback events
///
/// Events describe things that already happened (past tense). They are
/// published by the context and players and broadcast to every subscriber.
use std::time::Duration;

use crate::audio_system::{AudioHandle, HandleKey, PlayerId};
use crate::backend::VoiceRef;
use crate::error::SaveKeyConflict;

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A new voice was spawned for `handle`
    Played {
        handle: AudioHandle,
        clip: String,
        delay: Duration,
    },

    /// A handle was stopped by the caller (or by singleton interruption)
    Stopped {
        player: PlayerId,
        id: u64,
        fade: Duration,
    },

    /// A voice went back to the pool. `player` spawned it; `owner` is set
    /// when the handle was still live, i.e. the voice ended naturally or was
    /// stolen.
    Reclaimed {
        voice: VoiceRef,
        player: Option<PlayerId>,
        owner: Option<HandleKey>,
    },

    /// An enabling player had its save key rewritten
    SaveKeyReassigned {
        player: PlayerId,
        conflict: SaveKeyConflict,
    },
}

impl PlaybackEvent {
    /// Player the event concerns, if any
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            PlaybackEvent::Played { handle, .. } => Some(handle.player()),
            PlaybackEvent::Stopped { player, .. } => Some(*player),
            PlaybackEvent::Reclaimed { player, .. } => *player,
            PlaybackEvent::SaveKeyReassigned { player, .. } => Some(*player),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_player() {
        let handle = AudioHandle::new(PlayerId(3), 0, 0);
        let played = PlaybackEvent::Played {
            handle,
            clip: "a".to_string(),
            delay: Duration::ZERO,
        };
        assert_eq!(played.player(), Some(PlayerId(3)));

        let faded = PlaybackEvent::Reclaimed {
            voice: VoiceRef(1),
            player: Some(PlayerId(3)),
            owner: None,
        };
        assert_eq!(faded.player(), Some(PlayerId(3)));
    }
}
