//! Beatmap track loading and time-indexed playback queries.
//!
//! A [`Track`] holds every timed event of a level as one ascending sequence
//! in seconds. Consumers query it with half-open time windows; the lookup is
//! a binary search, so queries are restartable from any time and backward
//! seeks need no cursor state.

pub mod format;

use std::path::Path;

use thiserror::Error;

pub use format::MapInfo;

/// Errors that can occur while loading a beatmap.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read beatmap file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed beatmap file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tempo: {0} bpm")]
    InvalidTempo(f64),
}

/// What a [`BeatEvent`] does. The payload is opaque to the track; the scene
/// interprets it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// Lighting change for one light group.
    Light { group: u8, value: u8 },
    /// A note crossing the play area.
    Note {
        line: u8,
        layer: u8,
        red: bool,
        direction: u8,
    },
    /// A wall spanning `duration_seconds` from the event time.
    Obstacle {
        line: u8,
        width: u8,
        duration_seconds: f64,
    },
}

/// A single timed event, timestamp already converted to seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    pub time_seconds: f64,
    pub kind: EventKind,
}

/// Convert a beat-unit timestamp to seconds at the given tempo.
pub fn beats_to_seconds(beats: f64, beats_per_minute: f64) -> f64 {
    beats * 60.0 / beats_per_minute
}

/// An immutable, time-ordered sequence of beat events.
pub struct Track {
    events: Vec<BeatEvent>,
}

impl Track {
    /// Load a difficulty file and convert its beat timestamps to seconds.
    pub fn load(path: &Path, beats_per_minute: f64) -> Result<Self, ParseError> {
        if !(beats_per_minute > 0.0) {
            return Err(ParseError::InvalidTempo(beats_per_minute));
        }
        let raw = format::RawDifficulty::load(path)?;
        Ok(Self::from_raw(&raw, beats_per_minute))
    }

    fn from_raw(raw: &format::RawDifficulty, bpm: f64) -> Self {
        let mut events = Vec::with_capacity(
            raw.events.len() + raw.notes.len() + raw.obstacles.len(),
        );

        for e in &raw.events {
            events.push(BeatEvent {
                time_seconds: beats_to_seconds(e.time, bpm),
                kind: EventKind::Light {
                    group: e.kind.clamp(0, u8::MAX as i64) as u8,
                    value: e.value.clamp(0, u8::MAX as i64) as u8,
                },
            });
        }
        for n in &raw.notes {
            events.push(BeatEvent {
                time_seconds: beats_to_seconds(n.time, bpm),
                kind: EventKind::Note {
                    line: n.line_index.clamp(0, 3) as u8,
                    layer: n.line_layer.clamp(0, 2) as u8,
                    red: n.kind == 0,
                    direction: n.cut_direction.clamp(0, 8) as u8,
                },
            });
        }
        for o in &raw.obstacles {
            events.push(BeatEvent {
                time_seconds: beats_to_seconds(o.time, bpm),
                kind: EventKind::Obstacle {
                    line: o.line_index.clamp(0, 3) as u8,
                    width: o.width.clamp(0, 4) as u8,
                    duration_seconds: beats_to_seconds(o.duration.max(0.0), bpm),
                },
            });
        }

        events.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
        Self { events }
    }

    /// Build a track directly from already-converted events (used by tests
    /// and procedural setups).
    pub fn from_events(mut events: Vec<BeatEvent>) -> Self {
        events.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
        Self { events }
    }

    /// All events with `start <= time_seconds < end`, ascending.
    ///
    /// An empty or inverted window yields an empty slice.
    pub fn events_in_window(&self, start: f64, end: f64) -> &[BeatEvent] {
        if !(end > start) {
            return &[];
        }
        let lo = self.events.partition_point(|e| e.time_seconds < start);
        let hi = self.events.partition_point(|e| e.time_seconds < end);
        &self.events[lo..hi]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn light(t: f64) -> BeatEvent {
        BeatEvent {
            time_seconds: t,
            kind: EventKind::Light { group: 0, value: 1 },
        }
    }

    #[test]
    fn test_beats_to_seconds_exact() {
        // 242 beats at 242 bpm is exactly one minute.
        assert_eq!(beats_to_seconds(242.0, 242.0), 60.0);
    }

    #[test]
    fn test_window_is_half_open_and_ordered() {
        let track = Track::from_events(vec![light(3.0), light(1.0), light(2.0), light(4.0)]);
        let hits = track.events_in_window(1.0, 3.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].time_seconds, 1.0);
        assert_eq!(hits[1].time_seconds, 2.0);
        for pair in hits.windows(2) {
            assert!(pair[0].time_seconds <= pair[1].time_seconds);
        }
        for e in hits {
            assert!(e.time_seconds >= 1.0 && e.time_seconds < 3.0);
        }
    }

    #[test]
    fn test_empty_window_yields_empty() {
        let track = Track::from_events(vec![light(1.0)]);
        assert!(track.events_in_window(2.0, 2.0).is_empty());
        assert!(track.events_in_window(3.0, 2.0).is_empty());
        assert!(track.events_in_window(5.0, 9.0).is_empty());

        let empty = Track::from_events(Vec::new());
        assert!(empty.events_in_window(0.0, 100.0).is_empty());
    }

    #[test]
    fn test_queries_are_restartable() {
        // Backward seeks must see the same events as the first pass.
        let track = Track::from_events(vec![light(1.0), light(5.0), light(9.0)]);
        let first = track.events_in_window(0.0, 6.0).to_vec();
        let _ = track.events_in_window(8.0, 10.0);
        let again = track.events_in_window(0.0, 6.0);
        assert_eq!(first, again);
    }

    #[test]
    fn test_load_converts_beats() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "_events": [{{"_time": 242.0, "_type": 1, "_value": 5}}],
                "_obstacles": [{{"_time": 0.0, "_lineIndex": 0, "_duration": 121.0, "_width": 2}}]
            }}"#
        )
        .unwrap();

        let track = Track::load(file.path(), 242.0).unwrap();
        assert_eq!(track.len(), 2);

        let walls = track.events_in_window(0.0, 1.0);
        assert_eq!(walls.len(), 1);
        match walls[0].kind {
            EventKind::Obstacle {
                duration_seconds, ..
            } => assert_eq!(duration_seconds, 30.0),
            _ => panic!("expected obstacle"),
        }

        let lights = track.events_in_window(59.0, 61.0);
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].time_seconds, 60.0);
    }

    #[test]
    fn test_load_rejects_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            Track::load(file.path(), 120.0),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn test_load_rejects_bad_tempo() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            Track::load(file.path(), 0.0),
            Err(ParseError::InvalidTempo(_))
        ));
        assert!(matches!(
            Track::load(file.path(), f64::NAN),
            Err(ParseError::InvalidTempo(_))
        ));
    }
}
