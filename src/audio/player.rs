//! Audio playback clock.
//!
//! [`PlaybackClock`] owns the output device and is the sole time source the
//! rest of the system trusts: animation reads playback time from here, never
//! from accumulated frame deltas, so audio and visuals stay locked under
//! frame-rate variance.

use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use thiserror::Error;

use super::loader::AudioData;

/// Errors that can occur while opening the audio output.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("No audio output device: {0}")]
    Stream(#[from] rodio::StreamError),

    #[error("Failed to open audio sink: {0}")]
    Play(#[from] rodio::PlayError),
}

/// Clamp a seek target into the playable range.
///
/// Seeking past the end is a playback convenience, not an error; the policy
/// is a deterministic clamp to track end.
pub fn clamp_seek(requested: f64, duration: f64) -> f64 {
    if requested.is_nan() {
        return 0.0;
    }
    requested.clamp(0.0, duration)
}

/// Playback clock wrapping the audio output device.
pub struct PlaybackClock {
    // The stream must stay alive for the sink to keep producing sound.
    _stream: OutputStream,
    _handle: OutputStreamHandle,
    sink: Sink,
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    duration: f64,
    seek_base: f64,
}

impl PlaybackClock {
    /// Bind the default output device to a decoded audio buffer.
    ///
    /// The clock starts paused at time zero.
    pub fn new(audio: AudioData) -> Result<Self, PlayerError> {
        let (stream, handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&handle)?;
        sink.pause();

        let duration = audio.duration();
        let channels = audio.channels.max(1) as u16;
        let clock = Self {
            _stream: stream,
            _handle: handle,
            sink,
            samples: audio.samples,
            channels,
            sample_rate: audio.sample_rate,
            duration,
            seek_base: 0.0,
        };
        clock.queue_from(0.0);
        Ok(clock)
    }

    fn queue_from(&self, offset_seconds: f64) {
        let source = SamplesBuffer::new(self.channels, self.sample_rate, self.samples.clone())
            .skip_duration(Duration::from_secs_f64(offset_seconds));
        self.sink.append(source);
    }

    /// Start or resume playback. No-op when already playing.
    pub fn play(&self) {
        self.sink.play();
    }

    /// Pause playback. No-op when already paused.
    pub fn pause(&self) {
        self.sink.pause();
    }

    pub fn is_playing(&self) -> bool {
        !self.sink.is_paused()
    }

    /// Jump to `time_seconds`, clamped to the track bounds.
    ///
    /// Playback state (playing/paused) is preserved across the seek.
    pub fn seek(&mut self, time_seconds: f64) {
        let target = clamp_seek(time_seconds, self.duration);
        let was_playing = self.is_playing();

        self.sink.clear();
        self.queue_from(target);
        self.seek_base = target;

        if was_playing {
            self.sink.play();
        }
    }

    /// Current playback position in seconds.
    ///
    /// Monotonic non-decreasing between seeks; only advances while playing;
    /// never exceeds the track duration.
    pub fn current_time(&self) -> f64 {
        let pos = self.seek_base + self.sink.get_pos().as_secs_f64();
        pos.min(self.duration)
    }

    /// Track duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.max(0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_audio(seconds: f64) -> AudioData {
        let sample_rate = 8000u32;
        let frames = (seconds * sample_rate as f64) as usize;
        AudioData {
            samples: vec![0.0; frames],
            sample_rate,
            channels: 1,
        }
    }

    #[test]
    fn test_clamp_seek_within_bounds() {
        assert_eq!(clamp_seek(1.5, 10.0), 1.5);
        assert_eq!(clamp_seek(0.0, 10.0), 0.0);
    }

    #[test]
    fn test_clamp_seek_past_end_clamps_to_duration() {
        assert_eq!(clamp_seek(99.0, 10.0), 10.0);
    }

    #[test]
    fn test_clamp_seek_negative_and_nonfinite() {
        assert_eq!(clamp_seek(-3.0, 10.0), 0.0);
        assert_eq!(clamp_seek(f64::NAN, 10.0), 0.0);
        assert_eq!(clamp_seek(f64::INFINITY, 10.0), 10.0);
    }

    // Device-backed tests skip when no output device is available (CI).

    #[test]
    fn test_pause_is_idempotent() {
        let mut clock = match PlaybackClock::new(test_audio(2.0)) {
            Ok(c) => c,
            Err(_) => return,
        };
        clock.play();
        clock.pause();
        let after_one = (clock.is_playing(), clock.current_time());
        clock.pause();
        let after_two = (clock.is_playing(), clock.current_time());
        assert_eq!(after_one, after_two);
        clock.seek(0.5);
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_time_frozen_while_paused() {
        let clock = match PlaybackClock::new(test_audio(2.0)) {
            Ok(c) => c,
            Err(_) => return,
        };
        clock.pause();
        let t1 = clock.current_time();
        std::thread::sleep(std::time::Duration::from_millis(50));
        let t2 = clock.current_time();
        assert_eq!(t1, t2);
    }

    #[test]
    fn test_seek_past_end_clamps() {
        let mut clock = match PlaybackClock::new(test_audio(2.0)) {
            Ok(c) => c,
            Err(_) => return,
        };
        clock.seek(1000.0);
        assert!(clock.current_time() <= clock.duration());
    }
}
