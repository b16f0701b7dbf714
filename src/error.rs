use thiserror::Error;

/// Library errors using thiserror for structured error handling.
///
/// Playback errors are raised synchronously from `AudioPlayer::play`; nothing
/// is spawned when one is returned. Save-key conflicts are resolved in place
/// and only reported.

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Audio player `{player}` has no clips")]
    NoClips { player: String },

    #[error("Clip `{clip}` not found in audio player `{player}`")]
    ClipNotFound { player: String, clip: String },

    #[error("Clip slot {index} of audio player `{player}` is empty")]
    ClipNull { player: String, index: usize },

    #[error("Clip index {index} out of range for audio player `{player}` ({len} clips)")]
    ClipIndexOutOfRange {
        player: String,
        index: usize,
        len: usize,
    },

    #[error("Voice backend failed")]
    Backend(#[from] BackendError),
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize audio output stream")]
    StreamInitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to decode clip `{clip}`")]
    DecodeFailed {
        clip: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unknown voice: {0}")]
    UnknownVoice(u64),

    #[error("Voice {voice} has no clip bound")]
    NoClipBound { voice: u64 },
}

#[derive(Error, Debug)]
pub enum ClipError {
    #[error("Failed to load audio file: {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to probe audio format of `{name}`")]
    ProbeFailed {
        name: String,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("No supported audio tracks found in `{name}`")]
    NoTrack { name: String },

    #[error("Unknown sample rate in `{name}`")]
    UnknownSampleRate { name: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not determine the platform config directory")]
    NoConfigDir,
}

/// Two enabled players claimed the same persistence save key.
///
/// Non-fatal: the incoming player already received `reassigned` by the time
/// this is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Found conflicting save key {key} between existing audio player `{existing}` and `{incoming}`; \
     `{incoming}` now uses {reassigned}"
)]
pub struct SaveKeyConflict {
    pub key: i32,
    pub existing: String,
    pub incoming: String,
    pub reassigned: i32,
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
