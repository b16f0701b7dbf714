/// Audio clips
///
/// A clip is an encoded audio file preloaded into memory together with its
/// probed duration. Voices decode from the shared bytes on every play.
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::ClipError;

/// A named, preloaded audio clip
#[derive(Clone)]
pub struct AudioClip {
    name: String,
    duration: Duration,
    data: Arc<[u8]>,
}

impl AudioClip {
    /// Load a clip from disk, probing its duration.
    ///
    /// The clip name is the file stem, which is what `AudioPlayer::find_index`
    /// matches against.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClipError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| ClipError::LoadFailed {
            path: path.display().to_string(),
            source,
        })?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let extension = path.extension().and_then(|e| e.to_str());

        let clip = Self::from_memory(name, data, extension)?;
        tracing::info!(
            "Preloaded clip `{}` from {} ({} bytes, {:.2}s)",
            clip.name,
            path.display(),
            clip.data.len(),
            clip.duration.as_secs_f32()
        );
        Ok(clip)
    }

    /// Build a clip from encoded bytes already in memory
    pub fn from_memory(
        name: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        extension: Option<&str>,
    ) -> Result<Self, ClipError> {
        let name = name.into();
        let data = data.into();
        let duration = probe_duration(&name, Arc::clone(&data), extension)?;
        Ok(Self {
            name,
            duration,
            data,
        })
    }

    /// A clip with a known duration and no audio data.
    ///
    /// Useful with headless backends that never decode.
    pub fn silent(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
            data: Arc::from(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length of one pass through the clip at pitch 1
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip")
            .field("name", &self.name)
            .field("duration", &self.duration)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Read the duration of the first decodable track.
///
/// Uses the frame count from the container header when present and falls
/// back to summing packet durations otherwise (common for MP3).
fn probe_duration(
    name: &str,
    data: Arc<[u8]>,
    extension: Option<&str>,
) -> Result<Duration, ClipError> {
    let probe_failed = |source| ClipError::ProbeFailed {
        name: name.to_string(),
        source,
    };

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(probe_failed)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ClipError::NoTrack {
            name: name.to_string(),
        })?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| ClipError::UnknownSampleRate {
            name: name.to_string(),
        })?;
    let n_frames = track.codec_params.n_frames;

    let frames = match n_frames {
        Some(frames) => frames,
        None => {
            let mut frames = 0u64;
            loop {
                match format.next_packet() {
                    Ok(packet) if packet.track_id() == track_id => frames += packet.dur,
                    Ok(_) => continue,
                    Err(symphonia::core::errors::Error::IoError(err))
                        if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        break;
                    }
                    Err(err) => return Err(probe_failed(err)),
                }
            }
            frames
        }
    };

    Ok(Duration::from_secs_f64(frames as f64 / sample_rate as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, frames: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                writer.write_sample(((i % 64) as i16 - 32) * 256).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_probe_wav_duration() {
        let clip = AudioClip::from_memory("beep", wav_bytes(8_000, 4_000), Some("wav")).unwrap();
        assert_eq!(clip.name(), "beep");
        assert!((clip.duration().as_secs_f32() - 0.5).abs() < 1e-3);
        assert!(!clip.data().is_empty());
    }

    #[test]
    fn test_from_file_uses_file_stem() {
        let path = std::env::temp_dir().join("audoty_clip_test_step.wav");
        std::fs::write(&path, wav_bytes(8_000, 8_000)).unwrap();

        let clip = AudioClip::from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(clip.name(), "audoty_clip_test_step");
        assert!((clip.duration().as_secs_f32() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_missing_file_fails() {
        let result = AudioClip::from_file("nonexistent_clip.wav");
        assert!(matches!(result, Err(ClipError::LoadFailed { .. })));
    }

    #[test]
    fn test_garbage_fails_probe() {
        let result = AudioClip::from_memory("noise", vec![0u8; 16], None);
        assert!(result.is_err());
    }

    #[test]
    fn test_silent_clip() {
        let clip = AudioClip::silent("rest", Duration::from_secs(2));
        assert_eq!(clip.duration(), Duration::from_secs(2));
        assert!(clip.data().is_empty());
    }
}
