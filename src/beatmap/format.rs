//! On-disk beatmap file formats.
//!
//! Difficulty files carry `_events`, `_notes` and `_obstacles` arrays with
//! timestamps in beat units; the companion `info.dat` carries the tempo used
//! to convert them to seconds.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::ParseError;

/// A raw difficulty file, timestamps still in beat units.
#[derive(Debug, Deserialize)]
pub struct RawDifficulty {
    #[serde(rename = "_events", default)]
    pub events: Vec<RawEvent>,
    #[serde(rename = "_notes", default)]
    pub notes: Vec<RawNote>,
    #[serde(rename = "_obstacles", default)]
    pub obstacles: Vec<RawObstacle>,
}

#[derive(Debug, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "_time")]
    pub time: f64,
    #[serde(rename = "_type")]
    pub kind: i64,
    #[serde(rename = "_value")]
    pub value: i64,
}

#[derive(Debug, Deserialize)]
pub struct RawNote {
    #[serde(rename = "_time")]
    pub time: f64,
    #[serde(rename = "_lineIndex")]
    pub line_index: i64,
    #[serde(rename = "_lineLayer")]
    pub line_layer: i64,
    #[serde(rename = "_type")]
    pub kind: i64,
    #[serde(rename = "_cutDirection")]
    pub cut_direction: i64,
}

#[derive(Debug, Deserialize)]
pub struct RawObstacle {
    #[serde(rename = "_time")]
    pub time: f64,
    #[serde(rename = "_lineIndex")]
    pub line_index: i64,
    #[serde(rename = "_duration")]
    pub duration: f64,
    #[serde(rename = "_width")]
    pub width: i64,
}

impl RawDifficulty {
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Level metadata read from the companion `info.dat`.
#[derive(Debug, Clone, Deserialize)]
pub struct MapInfo {
    #[serde(rename = "_beatsPerMinute")]
    pub beats_per_minute: f64,
    #[serde(rename = "_songFilename", default)]
    pub song_filename: Option<String>,
    #[serde(rename = "_songName", default)]
    pub song_name: Option<String>,
}

impl MapInfo {
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let data = fs::read_to_string(path)?;
        let info: MapInfo = serde_json::from_str(&data)?;
        if !(info.beats_per_minute > 0.0) {
            return Err(ParseError::InvalidTempo(info.beats_per_minute));
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_difficulty() {
        let json = r#"{
            "_events": [{"_time": 1.5, "_type": 2, "_value": 3}],
            "_notes": [{"_time": 2.0, "_lineIndex": 1, "_lineLayer": 0, "_type": 0, "_cutDirection": 1}],
            "_obstacles": [{"_time": 4.0, "_lineIndex": 0, "_duration": 2.0, "_width": 1}]
        }"#;
        let raw: RawDifficulty = serde_json::from_str(json).unwrap();
        assert_eq!(raw.events.len(), 1);
        assert_eq!(raw.notes.len(), 1);
        assert_eq!(raw.obstacles.len(), 1);
        assert_eq!(raw.events[0].kind, 2);
    }

    #[test]
    fn test_missing_event_time_is_rejected() {
        let json = r#"{"_events": [{"_type": 2, "_value": 3}]}"#;
        assert!(serde_json::from_str::<RawDifficulty>(json).is_err());
    }

    #[test]
    fn test_empty_arrays_default() {
        let raw: RawDifficulty = serde_json::from_str("{}").unwrap();
        assert!(raw.events.is_empty());
        assert!(raw.notes.is_empty());
        assert!(raw.obstacles.is_empty());
    }

    #[test]
    fn test_info_rejects_zero_tempo() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"_beatsPerMinute": 0.0}}"#).unwrap();
        let err = MapInfo::load(file.path()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidTempo(_)));
    }

    #[test]
    fn test_info_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"_beatsPerMinute": 242.0, "_songFilename": "song.wav"}}"#
        )
        .unwrap();
        let info = MapInfo::load(file.path()).unwrap();
        assert_eq!(info.beats_per_minute, 242.0);
        assert_eq!(info.song_filename.as_deref(), Some("song.wav"));
    }
}
