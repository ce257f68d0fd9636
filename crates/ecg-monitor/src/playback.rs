//! Heart-rate driven track selection

use ecg_core::{HeartRateEstimate, RateZone};
use ecg_processing::EstimateConsumer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// One track per heart-rate zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub low: PathBuf,
    pub normal: PathBuf,
    pub high: PathBuf,
}

impl Default for Playlist {
    fn default() -> Self {
        Self {
            low: PathBuf::from("slow.mp3"),
            normal: PathBuf::from("steady.mp3"),
            high: PathBuf::from("fast.mp3"),
        }
    }
}

impl Playlist {
    pub fn track_for(&self, zone: RateZone) -> &Path {
        match zone {
            RateZone::Low => &self.low,
            RateZone::Normal => &self.normal,
            RateZone::High => &self.high,
        }
    }
}

/// Picks the track for each estimate, switching only when the zone changes
#[derive(Debug, Clone, Default)]
pub struct PlaybackSelector {
    playlist: Playlist,
    current: Option<RateZone>,
    switches: u64,
}

impl PlaybackSelector {
    pub fn new(playlist: Playlist) -> Self {
        Self {
            playlist,
            current: None,
            switches: 0,
        }
    }

    /// Track to start for `bpm`, or `None` when the current one keeps playing
    pub fn select(&mut self, bpm: f64) -> Option<&Path> {
        let zone = RateZone::from_bpm(bpm);
        if self.current == Some(zone) {
            return None;
        }
        self.current = Some(zone);
        self.switches += 1;
        Some(self.playlist.track_for(zone))
    }

    pub fn current_zone(&self) -> Option<RateZone> {
        self.current
    }

    pub fn switches(&self) -> u64 {
        self.switches
    }
}

impl EstimateConsumer for PlaybackSelector {
    fn on_estimate(&mut self, estimate: &HeartRateEstimate) {
        if let Some(track) = self.select(estimate.bpm) {
            info!(
                "Playing {} ({:.1} BPM, zone {})",
                track.display(),
                estimate.bpm,
                estimate.zone().description()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switches_only_on_zone_change() {
        let mut selector = PlaybackSelector::new(Playlist::default());

        assert_eq!(selector.select(72.0), Some(Path::new("steady.mp3")));
        assert_eq!(selector.select(90.0), None);
        assert_eq!(selector.select(100.0), None);
        assert_eq!(selector.select(108.0), Some(Path::new("fast.mp3")));
        assert_eq!(selector.select(0.0), Some(Path::new("slow.mp3")));
        assert_eq!(selector.select(54.0), None);

        assert_eq!(selector.switches(), 3);
        assert_eq!(selector.current_zone(), Some(RateZone::Low));
    }

    #[test]
    fn test_consumer_interface() {
        let mut selector = PlaybackSelector::default();
        let estimate = HeartRateEstimate {
            bpm: 120.0,
            peak_indices: Default::default(),
            enhanced_signal: Default::default(),
        };

        selector.on_estimate(&estimate);
        selector.on_estimate(&estimate);
        assert_eq!(selector.switches(), 1);
        assert_eq!(selector.current_zone(), Some(RateZone::High));
    }
}
