/// Fade controller
///
/// Linear volume ramps advanced by the context's update loop. Nothing here
/// blocks or sleeps; a ramp is just a start time, a duration and two
/// endpoints evaluated against the current clock.
use std::collections::HashMap;
use std::time::Duration;

use super::pool::VoiceKey;
use crate::backend::{VoiceBackend, VoiceRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeKind {
    In,
    Out,
}

#[derive(Debug, Clone, Copy)]
struct Ramp {
    voice: VoiceRef,
    kind: FadeKind,
    from: f32,
    to: f32,
    start: Duration,
    duration: Duration,
}

impl Ramp {
    fn progress(&self, now: Duration) -> f32 {
        if now <= self.start {
            return 0.0;
        }
        let elapsed = (now - self.start).as_secs_f32();
        (elapsed / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    fn value(&self, now: Duration) -> f32 {
        let ceiling = self.from.max(self.to);
        (self.from + (self.to - self.from) * self.progress(now)).clamp(0.0, ceiling)
    }
}

/// What happened to a fade-out request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    /// Zero duration; the voice is silent now and can be reclaimed
    Done,
    /// Ramp scheduled; `update` reports it when it completes
    Pending,
}

/// Active ramps, at most one per voice
#[derive(Debug, Default)]
pub struct FadeController {
    ramps: HashMap<VoiceKey, Ramp>,
}

impl FadeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ramp from silence to `target` over `duration`, starting after `delay`
    #[allow(clippy::too_many_arguments)]
    pub fn fade_in<B: VoiceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        key: VoiceKey,
        voice: VoiceRef,
        target: f32,
        duration: Duration,
        delay: Duration,
        now: Duration,
    ) {
        let target = target.clamp(0.0, 1.0);
        if duration.is_zero() {
            self.ramps.remove(&key);
            backend.set_volume(voice, target);
            return;
        }

        backend.set_volume(voice, 0.0);
        self.ramps.insert(
            key,
            Ramp {
                voice,
                kind: FadeKind::In,
                from: 0.0,
                to: target,
                start: now + delay,
                duration,
            },
        );
    }

    /// Ramp from `from` to silence over `duration`, replacing any fade-in
    pub fn fade_out<B: VoiceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        key: VoiceKey,
        voice: VoiceRef,
        from: f32,
        duration: Duration,
        now: Duration,
    ) -> FadeOutcome {
        if duration.is_zero() {
            self.ramps.remove(&key);
            backend.set_volume(voice, 0.0);
            return FadeOutcome::Done;
        }

        self.ramps.insert(
            key,
            Ramp {
                voice,
                kind: FadeKind::Out,
                from: from.clamp(0.0, 1.0),
                to: 0.0,
                start: now,
                duration,
            },
        );
        FadeOutcome::Pending
    }

    /// Move the end point of a running fade-in. Returns false when the voice
    /// is not fading in.
    pub fn retarget(&mut self, key: VoiceKey, target: f32) -> bool {
        match self.ramps.get_mut(&key) {
            Some(ramp) if ramp.kind == FadeKind::In => {
                ramp.to = target.clamp(0.0, 1.0);
                true
            }
            _ => false,
        }
    }

    pub fn current_volume(&self, key: VoiceKey, now: Duration) -> Option<f32> {
        self.ramps.get(&key).map(|ramp| ramp.value(now))
    }

    pub fn kind(&self, key: VoiceKey) -> Option<FadeKind> {
        self.ramps.get(&key).map(|ramp| ramp.kind)
    }

    /// Drop the ramp of a reclaimed or reset voice; unknown keys are fine
    pub fn cancel(&mut self, key: VoiceKey) {
        self.ramps.remove(&key);
    }

    pub fn len(&self) -> usize {
        self.ramps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ramps.is_empty()
    }

    /// Push every ramp's value at `now` to the backend. Returns the voices
    /// whose fade-out finished.
    pub fn update<B: VoiceBackend + ?Sized>(&mut self, backend: &mut B, now: Duration) -> Vec<VoiceKey> {
        let mut finished = Vec::new();
        let mut faded_out = Vec::new();

        for (key, ramp) in self.ramps.iter() {
            if now < ramp.start {
                continue;
            }
            backend.set_volume(ramp.voice, ramp.value(now));
            if ramp.progress(now) >= 1.0 {
                finished.push(*key);
                if ramp.kind == FadeKind::Out {
                    faded_out.push(*key);
                }
            }
        }

        for key in finished {
            self.ramps.remove(&key);
        }
        faded_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::clip::AudioClip;
    use std::sync::Arc;

    fn setup() -> (RecordingBackend, VoiceRef, VoiceKey) {
        let mut backend = RecordingBackend::new();
        let clip = Arc::new(AudioClip::silent("a", Duration::from_secs(10)));
        let voice = backend.allocate(&clip, None).unwrap();
        (backend, voice, VoiceKey::new(0, 1))
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn volume(backend: &RecordingBackend, voice: VoiceRef) -> f32 {
        backend.voice(voice).unwrap().volume
    }

    #[test]
    fn test_zero_fade_in_is_instant() {
        let (mut backend, voice, key) = setup();
        let mut fades = FadeController::new();

        fades.fade_in(&mut backend, key, voice, 0.8, Duration::ZERO, Duration::ZERO, Duration::ZERO);

        assert_eq!(volume(&backend, voice), 0.8);
        assert!(fades.is_empty());
    }

    #[test]
    fn test_fade_in_ramps_linearly() {
        let (mut backend, voice, key) = setup();
        let mut fades = FadeController::new();

        fades.fade_in(&mut backend, key, voice, 1.0, ms(1000), Duration::ZERO, Duration::ZERO);
        assert_eq!(volume(&backend, voice), 0.0);

        fades.update(&mut backend, ms(250));
        assert!((volume(&backend, voice) - 0.25).abs() < 1e-4);

        fades.update(&mut backend, ms(1000));
        assert_eq!(volume(&backend, voice), 1.0);
        assert!(fades.is_empty());
    }

    #[test]
    fn test_fade_in_waits_for_delay() {
        let (mut backend, voice, key) = setup();
        let mut fades = FadeController::new();

        fades.fade_in(&mut backend, key, voice, 1.0, ms(100), ms(500), Duration::ZERO);

        fades.update(&mut backend, ms(400));
        assert_eq!(volume(&backend, voice), 0.0);

        fades.update(&mut backend, ms(550));
        assert!((volume(&backend, voice) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_fade_out_reports_completion() {
        let (mut backend, voice, key) = setup();
        let mut fades = FadeController::new();

        let outcome = fades.fade_out(&mut backend, key, voice, 0.6, ms(200), ms(1000));
        assert_eq!(outcome, FadeOutcome::Pending);

        assert!(fades.update(&mut backend, ms(1100)).is_empty());
        assert!((volume(&backend, voice) - 0.3).abs() < 1e-4);

        assert_eq!(fades.update(&mut backend, ms(1200)), vec![key]);
        assert_eq!(volume(&backend, voice), 0.0);
        assert!(fades.is_empty());
    }

    #[test]
    fn test_zero_fade_out_is_done() {
        let (mut backend, voice, key) = setup();
        let mut fades = FadeController::new();

        let outcome = fades.fade_out(&mut backend, key, voice, 1.0, Duration::ZERO, Duration::ZERO);

        assert_eq!(outcome, FadeOutcome::Done);
        assert_eq!(volume(&backend, voice), 0.0);
    }

    #[test]
    fn test_fade_out_replaces_fade_in() {
        let (mut backend, voice, key) = setup();
        let mut fades = FadeController::new();

        fades.fade_in(&mut backend, key, voice, 1.0, ms(1000), Duration::ZERO, Duration::ZERO);
        let from = fades.current_volume(key, ms(500)).unwrap();
        fades.fade_out(&mut backend, key, voice, from, ms(100), ms(500));

        assert_eq!(fades.kind(key), Some(FadeKind::Out));
        fades.update(&mut backend, ms(550));
        assert!((volume(&backend, voice) - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_retarget_only_affects_fade_in() {
        let (mut backend, voice, key) = setup();
        let mut fades = FadeController::new();

        fades.fade_in(&mut backend, key, voice, 1.0, ms(1000), Duration::ZERO, Duration::ZERO);
        assert!(fades.retarget(key, 0.5));
        fades.update(&mut backend, ms(500));
        assert!((volume(&backend, voice) - 0.25).abs() < 1e-4);

        fades.fade_out(&mut backend, key, voice, 0.25, ms(100), ms(500));
        assert!(!fades.retarget(key, 1.0));
    }

    #[test]
    fn test_ramp_is_monotonic_and_clamped() {
        let ramp = Ramp {
            voice: VoiceRef(0),
            kind: FadeKind::In,
            from: 0.0,
            to: 0.7,
            start: ms(0),
            duration: ms(100),
        };
        let mut last = 0.0;
        for t in 0..=150 {
            let v = ramp.value(ms(t));
            assert!(v >= last);
            assert!((0.0..=0.7).contains(&v));
            last = v;
        }
    }

    #[test]
    fn test_cancel_unknown_voice_is_fine() {
        let mut fades = FadeController::new();
        fades.cancel(VoiceKey::new(3, 7));
        assert!(fades.is_empty());
    }
}
