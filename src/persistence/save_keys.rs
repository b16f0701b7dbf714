/// Save-key uniqueness tracking
///
/// Every enabled player claims its save key here. A key already held by
/// another player is a conflict: the incoming player gets a fresh random key
/// and the conflict is reported, never failed.
use std::collections::HashMap;

use rand::Rng;

use crate::audio_system::PlayerId;
use crate::error::SaveKeyConflict;

/// Bounded so a pathological RNG cannot spin forever
const MAX_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone)]
struct Holder {
    player: PlayerId,
    name: String,
}

/// Save keys of all enabled players
#[derive(Debug, Default)]
pub struct SaveKeyRegistry {
    keys: HashMap<i32, Holder>,
}

impl SaveKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A random non-zero key
    pub fn random_key<R: Rng>(rng: &mut R) -> i32 {
        loop {
            let key = rng.gen_range(i32::MIN + 1..i32::MAX - 1);
            if key != 0 {
                return key;
            }
        }
    }

    /// Register `key` for `player`, rewriting it on collision.
    ///
    /// A zero key means "never assigned" and is replaced silently. Returns
    /// the first conflict resolved, if any.
    pub fn claim<R: Rng>(
        &mut self,
        key: &mut i32,
        player: PlayerId,
        name: &str,
        rng: &mut R,
    ) -> Option<SaveKeyConflict> {
        while *key == 0 {
            *key = Self::random_key(rng);
        }

        let mut conflict = None;
        for _ in 0..MAX_ATTEMPTS {
            match self.keys.get(key) {
                Some(holder) if holder.player == player => return conflict,
                Some(holder) => {
                    let reassigned = self.fresh_key(rng);
                    tracing::warn!(
                        "Found conflicting save keys between existing audio player `{}` and `{}`. \
                         Resolving the conflict by changing save key of `{}` ({} -> {})",
                        holder.name,
                        name,
                        name,
                        key,
                        reassigned
                    );
                    conflict.get_or_insert(SaveKeyConflict {
                        key: *key,
                        existing: holder.name.clone(),
                        incoming: name.to_string(),
                        reassigned,
                    });
                    *key = reassigned;
                }
                None => {
                    self.keys.insert(
                        *key,
                        Holder {
                            player,
                            name: name.to_string(),
                        },
                    );
                    return conflict;
                }
            }
        }

        tracing::error!("Gave up resolving save key for `{}` after {} attempts", name, MAX_ATTEMPTS);
        conflict
    }

    /// Drop `key` if `player` holds it
    pub fn release(&mut self, key: i32, player: PlayerId) {
        if self.keys.get(&key).is_some_and(|h| h.player == player) {
            self.keys.remove(&key);
        }
    }

    pub fn holder(&self, key: i32) -> Option<PlayerId> {
        self.keys.get(&key).map(|h| h.player)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn fresh_key<R: Rng>(&self, rng: &mut R) -> i32 {
        loop {
            let candidate = Self::random_key(rng);
            if !self.keys.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_key_gets_assigned() {
        let mut registry = SaveKeyRegistry::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut key = 0;

        let conflict = registry.claim(&mut key, PlayerId(1), "Steps", &mut rng);

        assert!(conflict.is_none());
        assert_ne!(key, 0);
        assert_eq!(registry.holder(key), Some(PlayerId(1)));
    }

    #[test]
    fn test_reclaim_by_same_player_is_not_a_conflict() {
        let mut registry = SaveKeyRegistry::new();
        let mut rng = StdRng::seed_from_u64(2);
        let mut key = 1234;

        registry.claim(&mut key, PlayerId(1), "Steps", &mut rng);
        let conflict = registry.claim(&mut key, PlayerId(1), "Steps", &mut rng);

        assert!(conflict.is_none());
        assert_eq!(key, 1234);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflict_reassigns_incoming() {
        let mut registry = SaveKeyRegistry::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut first = 77;
        let mut second = 77;

        registry.claim(&mut first, PlayerId(1), "Steps", &mut rng);
        let conflict = registry
            .claim(&mut second, PlayerId(2), "Doors", &mut rng)
            .expect("conflict reported");

        assert_eq!(first, 77);
        assert_ne!(second, 77);
        assert_ne!(second, 0);
        assert_eq!(conflict.key, 77);
        assert_eq!(conflict.existing, "Steps");
        assert_eq!(conflict.incoming, "Doors");
        assert_eq!(conflict.reassigned, second);
        assert_eq!(registry.holder(second), Some(PlayerId(2)));
    }

    #[test]
    fn test_release_only_by_holder() {
        let mut registry = SaveKeyRegistry::new();
        let mut rng = StdRng::seed_from_u64(4);
        let mut key = 5;
        registry.claim(&mut key, PlayerId(1), "Steps", &mut rng);

        registry.release(5, PlayerId(2));
        assert_eq!(registry.holder(5), Some(PlayerId(1)));

        registry.release(5, PlayerId(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_random_key_never_zero() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1_000 {
            assert_ne!(SaveKeyRegistry::random_key(&mut rng), 0);
        }
    }
}
