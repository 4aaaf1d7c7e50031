// SPDX-License-Identifier: MIT
//! Result document types — the JSON shape persisted per event and read by
//! the results pages.
//!
//! Maps are `BTreeMap` so serialization order is stable: re-running the
//! aggregation over unchanged telemetry produces a byte-identical
//! `perParticipant` document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One event's generated results: a bundle per assigned participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsDocument {
    pub generated_at_ms: i64,
    pub per_participant: BTreeMap<String, ParticipantResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResult {
    /// Other participants ordered by their maximum heart rate, highest first.
    pub excitement_ranking: Vec<String>,
    /// Other participants ordered by their mean heart rate, highest first.
    pub heart_rate_ranking: Vec<String>,
    /// Other participants ordered by mean inter-device distance, closest first.
    pub proximity_ranking: Vec<String>,
    pub heart_rate_details: HeartRateDetails,
    /// Keyed by the other participant's id.
    pub proximity_details: BTreeMap<String, ProximityDetail>,
    /// Keyed by the other participant's id; only the first three others in
    /// roster order receive an entry.
    pub excitement_details: BTreeMap<String, ExcitementDetail>,
}

/// The participant's own heart-rate peak and its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateDetails {
    /// Highest recorded bpm; 0 when the participant has no samples.
    pub max_heart_rate: i64,
    /// `%H:%M` time-of-day of the peak sample.
    pub peak_time: Option<String>,
    /// Distance of the peer sample nearest in time to the peak (within
    /// 30 000 ms), divided by 100 for display.
    pub min_distance: Option<f64>,
    /// Mean of all the participant's peer distances, divided by 100.
    pub average_distance: f64,
    /// The last four heart-rate samples, oldest first.
    pub timeline: Vec<HrPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrPoint {
    pub time: String,
    pub bpm: i64,
}

/// Per-peer proximity summary from the participant's own peer samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityDetail {
    /// Mean distance, divided by 100 for display.
    pub average_distance: f64,
    /// Minimum distance, divided by 100 for display.
    pub min_distance: f64,
    /// Count of samples at or under the 500-unit closeness threshold.
    pub time_in_proximity: i64,
    /// The last four samples for this peer, oldest first.
    pub timeline: Vec<DistancePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistancePoint {
    pub time: String,
    /// Divided by 100 for display.
    pub distance: f64,
}

/// Coarse excitement bucket derived from the participant's maximum bpm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExcitementLevel {
    Low,
    Mid,
    High,
    Max,
}

impl ExcitementLevel {
    /// Bucket thresholds: above 160 → MAX, above 140 → HIGH,
    /// above 120 → MID, else LOW.
    pub fn from_max_bpm(max_bpm: i64) -> ExcitementLevel {
        if max_bpm > 160 {
            ExcitementLevel::Max
        } else if max_bpm > 140 {
            ExcitementLevel::High
        } else if max_bpm > 120 {
            ExcitementLevel::Mid
        } else {
            ExcitementLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcitementDetail {
    pub excitement_level: ExcitementLevel,
    /// Seconds-like count of samples above mean + 20 bpm.
    pub duration: i64,
    pub peak_time: Option<String>,
}
