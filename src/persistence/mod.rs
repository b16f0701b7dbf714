/// Parameter persistence
///
/// Players persist their overridable parameters into a small key-value store
/// (ints and floats), namespaced by a per-player random save key:
///
/// ```text
/// "{save_key}_volume"      -> float
/// "{save_key}_loop"        -> int (0/1)
/// "{save_key}_pitchX"      -> float
/// ```
///
/// [`SaveKeyRegistry`] keeps the keys of all enabled players unique.
pub mod prefs;
pub mod save_keys;

pub use prefs::{JsonPrefs, MemoryPrefs, PreferenceStore};
pub use save_keys::SaveKeyRegistry;
