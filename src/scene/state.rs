//! Per-frame animation state.
//!
//! [`SceneState::sample`] is a pure function of (track, time): calling it
//! twice at the same time yields identical state, and any time is reachable
//! directly, so seeking backward needs no cursor bookkeeping. Events only
//! influence the scene inside bounded activation windows.

use crate::beatmap::{EventKind, Track};

/// Light groups addressed by light events: back lasers, ring lights, left
/// lasers, right lasers, center lights.
pub const LIGHT_GROUP_COUNT: usize = 5;

/// How long a flash/fade event keeps animating.
const FLASH_SECONDS: f64 = 1.5;
/// How long an "on" event sustains before fading out.
const SUSTAIN_SECONDS: f64 = 8.0;
/// Lifetime of a note pulse.
const NOTE_PULSE_SECONDS: f64 = 0.6;
/// Widest obstacle span we scan back for.
const OBSTACLE_LOOKBACK_SECONDS: f64 = 30.0;
/// Keeps an event landing exactly on the sample time inside the half-open
/// query window.
const EVENT_EPSILON: f64 = 1e-6;

pub const BLUE: [f32; 3] = [0.25, 0.55, 1.0];
pub const RED: [f32; 3] = [1.0, 0.22, 0.3];

/// Lighting state of one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupState {
    pub intensity: f32,
    pub color: [f32; 3],
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            color: BLUE,
        }
    }
}

/// An obstacle currently crossing the tunnel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleState {
    pub lane: u8,
    pub width: u8,
    /// 0.0 at spawn, 1.0 at expiry.
    pub progress: f32,
}

/// A note pulse flashing at its grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotePulse {
    pub line: u8,
    pub layer: u8,
    pub red: bool,
    /// Seconds since the note's event time.
    pub age: f32,
}

impl NotePulse {
    /// 1.0 at the hit, 0.0 when the pulse expires.
    pub fn fade(&self) -> f32 {
        (1.0 - self.age / NOTE_PULSE_SECONDS as f32).max(0.0)
    }
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneState {
    pub groups: [GroupState; LIGHT_GROUP_COUNT],
    pub obstacles: Vec<ObstacleState>,
    pub notes: Vec<NotePulse>,
}

impl SceneState {
    /// Sample the animation state at `time_seconds`.
    pub fn sample(track: &Track, time_seconds: f64) -> Self {
        let horizon = time_seconds + EVENT_EPSILON;

        // The latest light event per group wins; the window slice is
        // ascending, so later entries overwrite earlier ones.
        let mut latest_light: [Option<(f64, u8)>; LIGHT_GROUP_COUNT] =
            [None; LIGHT_GROUP_COUNT];
        for event in track.events_in_window(time_seconds - SUSTAIN_SECONDS, horizon) {
            if let EventKind::Light { group, value } = event.kind {
                if (group as usize) < LIGHT_GROUP_COUNT {
                    latest_light[group as usize] = Some((event.time_seconds, value));
                }
            }
        }

        let mut groups = [GroupState::default(); LIGHT_GROUP_COUNT];
        for (slot, hit) in groups.iter_mut().zip(latest_light) {
            if let Some((at, value)) = hit {
                let age = (time_seconds - at).max(0.0);
                *slot = GroupState {
                    intensity: light_envelope(value, age),
                    color: light_color(value),
                };
            }
        }

        let mut obstacles = Vec::new();
        let mut notes = Vec::new();
        for event in track.events_in_window(time_seconds - OBSTACLE_LOOKBACK_SECONDS, horizon) {
            let age = time_seconds - event.time_seconds;
            match event.kind {
                EventKind::Obstacle {
                    line,
                    width,
                    duration_seconds,
                } => {
                    if age >= 0.0 && age < duration_seconds {
                        obstacles.push(ObstacleState {
                            lane: line,
                            width,
                            progress: (age / duration_seconds) as f32,
                        });
                    }
                }
                EventKind::Note {
                    line, layer, red, ..
                } => {
                    if age >= 0.0 && age < NOTE_PULSE_SECONDS {
                        notes.push(NotePulse {
                            line,
                            layer,
                            red,
                            age: age as f32,
                        });
                    }
                }
                EventKind::Light { .. } => {}
            }
        }

        Self {
            groups,
            obstacles,
            notes,
        }
    }

    /// Whether any event currently drives the scene.
    pub fn any_active(&self) -> bool {
        self.groups.iter().any(|g| g.intensity > 0.0)
            || !self.obstacles.is_empty()
            || !self.notes.is_empty()
    }
}

fn light_color(value: u8) -> [f32; 3] {
    if value >= 5 {
        RED
    } else {
        BLUE
    }
}

/// Intensity of a light event `age` seconds after it fired.
///
/// Values follow the beatmap lighting convention: 0/4 off, 1/5 on,
/// 2/6 flash, 3/7 fade (blue family below 5, red family above).
fn light_envelope(value: u8, age: f64) -> f32 {
    match value {
        1 | 5 => (1.0 - age / SUSTAIN_SECONDS).max(0.0) as f32,
        2 | 6 => {
            let k = (1.0 - age / FLASH_SECONDS).max(0.0);
            (1.5 * k * k) as f32
        }
        3 | 7 => (1.0 - age / FLASH_SECONDS).max(0.0) as f32,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beatmap::{beats_to_seconds, BeatEvent, Track};

    fn light_at(t: f64, group: u8, value: u8) -> BeatEvent {
        BeatEvent {
            time_seconds: t,
            kind: EventKind::Light { group, value },
        }
    }

    #[test]
    fn test_sampling_is_idempotent() {
        let track = Track::from_events(vec![
            light_at(0.0, 0, 1),
            light_at(0.5, 2, 6),
            BeatEvent {
                time_seconds: 0.2,
                kind: EventKind::Obstacle {
                    line: 1,
                    width: 2,
                    duration_seconds: 4.0,
                },
            },
        ]);
        for t in [0.0, 0.5, 1.0, 3.9, 100.0] {
            assert_eq!(SceneState::sample(&track, t), SceneState::sample(&track, t));
        }
    }

    #[test]
    fn test_event_at_beat_zero_is_active_then_expires() {
        // One event at beat 0 of a 242 bpm map.
        let track = Track::from_events(vec![light_at(beats_to_seconds(0.0, 242.0), 0, 1)]);

        let now = SceneState::sample(&track, 0.0);
        assert!(now.any_active());
        assert!(now.groups[0].intensity > 0.0);

        let far = SceneState::sample(&track, 100.0);
        assert!(!far.any_active());
    }

    #[test]
    fn test_loaded_track_drives_the_scene() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"_events": [{{"_time": 0.0, "_type": 0, "_value": 1}}]}}"#
        )
        .unwrap();
        let track = Track::load(file.path(), 242.0).unwrap();

        assert!(SceneState::sample(&track, 0.0).any_active());
        assert!(!SceneState::sample(&track, 100.0).any_active());
    }

    #[test]
    fn test_future_events_do_not_leak_backward() {
        let track = Track::from_events(vec![light_at(5.0, 1, 2)]);
        assert!(!SceneState::sample(&track, 4.9).any_active());
        assert!(SceneState::sample(&track, 5.0).any_active());
    }

    #[test]
    fn test_latest_light_event_wins() {
        let track = Track::from_events(vec![light_at(0.0, 0, 1), light_at(1.0, 0, 0)]);
        // The later "off" event overrides the earlier "on".
        let state = SceneState::sample(&track, 1.0);
        assert_eq!(state.groups[0].intensity, 0.0);
    }

    #[test]
    fn test_flash_decays_within_window() {
        let track = Track::from_events(vec![light_at(0.0, 3, 6)]);
        let at_peak = SceneState::sample(&track, 0.0).groups[3].intensity;
        let mid = SceneState::sample(&track, 0.5).groups[3].intensity;
        let done = SceneState::sample(&track, 2.0).groups[3].intensity;
        assert!(at_peak > mid);
        assert!(mid > 0.0);
        assert_eq!(done, 0.0);
    }

    #[test]
    fn test_red_and_blue_families() {
        let track = Track::from_events(vec![light_at(0.0, 0, 1), light_at(0.0, 1, 5)]);
        let state = SceneState::sample(&track, 0.0);
        assert_eq!(state.groups[0].color, BLUE);
        assert_eq!(state.groups[1].color, RED);
    }

    #[test]
    fn test_obstacle_active_only_during_duration() {
        let track = Track::from_events(vec![BeatEvent {
            time_seconds: 1.0,
            kind: EventKind::Obstacle {
                line: 0,
                width: 1,
                duration_seconds: 2.0,
            },
        }]);
        assert!(SceneState::sample(&track, 0.5).obstacles.is_empty());
        let mid = SceneState::sample(&track, 2.0);
        assert_eq!(mid.obstacles.len(), 1);
        assert!((mid.obstacles[0].progress - 0.5).abs() < 1e-6);
        assert!(SceneState::sample(&track, 3.5).obstacles.is_empty());
    }

    #[test]
    fn test_note_pulse_expires() {
        let track = Track::from_events(vec![BeatEvent {
            time_seconds: 2.0,
            kind: EventKind::Note {
                line: 1,
                layer: 0,
                red: true,
                direction: 1,
            },
        }]);
        assert_eq!(SceneState::sample(&track, 2.0).notes.len(), 1);
        assert!(SceneState::sample(&track, 3.0).notes.is_empty());
    }

    #[test]
    fn test_unknown_group_is_ignored() {
        let track = Track::from_events(vec![light_at(0.0, 12, 1)]);
        let state = SceneState::sample(&track, 0.0);
        assert!(!state.any_active());
    }
}
