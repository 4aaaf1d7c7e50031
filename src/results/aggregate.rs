// SPDX-License-Identifier: MIT
//! The aggregation pass: nested mean/max/min scans over the event's
//! in-memory telemetry, producing one [`ParticipantResult`] per assigned
//! participant.
//!
//! Everything here is pure — storage reads happen in the caller — so the
//! arithmetic is testable without a database.

use std::collections::{BTreeMap, HashMap};

use chrono::DateTime;

use crate::results::model::{
    DistancePoint, ExcitementDetail, ExcitementLevel, HeartRateDetails, HrPoint,
    ParticipantResult, ProximityDetail, ResultsDocument,
};
use crate::storage::AssignmentRow;
use crate::telemetry::storage::{HrSampleRow, PeerSampleRow};

/// Mean distance assumed for a pair with no recorded samples: an
/// arbitrarily large "far" sentinel that sorts such pairs last.
const FAR_SENTINEL: f64 = 1000.0;

/// Peer samples more than this far from the heart-rate peak do not count
/// as "the distance at the peak".
const PEAK_WINDOW_MS: i64 = 30_000;

/// Samples at or under this raw distance count toward time-in-proximity.
const PROXIMITY_THRESHOLD: i64 = 500;

/// How many trailing samples each timeline keeps.
const TIMELINE_LEN: usize = 4;

pub fn generate(
    assignments: &[AssignmentRow],
    hr: &[HrSampleRow],
    peers: &[PeerSampleRow],
    generated_at_ms: i64,
) -> ResultsDocument {
    // Roster order (assignment order) is the stable tie-break everywhere.
    let roster: Vec<(&str, &str)> = assignments
        .iter()
        .map(|a| (a.participant_id.as_str(), a.device_id.as_str()))
        .collect();
    let participant_by_device: HashMap<&str, &str> =
        roster.iter().map(|(p, d)| (*d, *p)).collect();

    // Non-null heart-rate samples per device, time-ascending.
    let mut hr_by_device: HashMap<&str, Vec<(i64, i64)>> = HashMap::new();
    for row in hr {
        if let Some(bpm) = row.heart_rate_bpm {
            hr_by_device
                .entry(row.device_id.as_str())
                .or_default()
                .push((row.timestamp_ms, bpm));
        }
    }
    for samples in hr_by_device.values_mut() {
        samples.sort_by_key(|(ts, _)| *ts);
    }

    // Each device's own peer rows, time-ascending.
    let mut peers_by_device: HashMap<&str, Vec<&PeerSampleRow>> = HashMap::new();
    for row in peers {
        peers_by_device
            .entry(row.device_id.as_str())
            .or_default()
            .push(row);
    }
    for samples in peers_by_device.values_mut() {
        samples.sort_by_key(|p| p.timestamp_ms);
    }

    let mut per_participant = BTreeMap::new();
    for &(participant, device) in &roster {
        let others: Vec<(&str, &str)> = roster
            .iter()
            .filter(|(p, _)| *p != participant)
            .copied()
            .collect();
        let bundle = participant_bundle(
            device,
            &others,
            &hr_by_device,
            &peers_by_device,
            &participant_by_device,
            peers,
        );
        per_participant.insert(participant.to_string(), bundle);
    }

    ResultsDocument {
        generated_at_ms,
        per_participant,
    }
}

fn participant_bundle(
    device: &str,
    others: &[(&str, &str)],
    hr_by_device: &HashMap<&str, Vec<(i64, i64)>>,
    peers_by_device: &HashMap<&str, Vec<&PeerSampleRow>>,
    participant_by_device: &HashMap<&str, &str>,
    all_peers: &[PeerSampleRow],
) -> ParticipantResult {
    let own_hr = hr_of(hr_by_device, device);
    let own_peers: &[&PeerSampleRow] = peers_by_device
        .get(device)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    // ── Heart-rate ranking: mean bpm of each other participant, highest first.
    let mut by_mean: Vec<(&str, f64)> = others
        .iter()
        .map(|(p, d)| (*p, mean_bpm(hr_of(hr_by_device, d))))
        .collect();
    by_mean.sort_by(|a, b| b.1.total_cmp(&a.1));
    let heart_rate_ranking = by_mean.iter().map(|(p, _)| p.to_string()).collect();

    // ── Proximity ranking: mean distance between the two devices (either
    // direction of the pair), closest first; no samples → far sentinel.
    let mut by_distance: Vec<(&str, f64)> = others
        .iter()
        .map(|(p, d)| (*p, pair_mean_distance(all_peers, device, d)))
        .collect();
    by_distance.sort_by(|a, b| a.1.total_cmp(&b.1));
    let proximity_ranking = by_distance.iter().map(|(p, _)| p.to_string()).collect();

    // ── Excitement ranking: max bpm of each other participant, highest first.
    let mut by_max: Vec<(&str, i64)> = others
        .iter()
        .map(|(p, d)| (*p, max_bpm(hr_of(hr_by_device, d))))
        .collect();
    by_max.sort_by(|a, b| b.1.cmp(&a.1));
    let excitement_ranking = by_max.iter().map(|(p, _)| p.to_string()).collect();

    ParticipantResult {
        excitement_ranking,
        heart_rate_ranking,
        proximity_ranking,
        heart_rate_details: heart_rate_details(own_hr, own_peers),
        proximity_details: proximity_details(device, own_peers, participant_by_device),
        excitement_details: excitement_details(own_hr, others),
    }
}

fn heart_rate_details(own_hr: &[(i64, i64)], own_peers: &[&PeerSampleRow]) -> HeartRateDetails {
    let peak = peak_sample(own_hr);

    let min_distance = peak.and_then(|(peak_ts, _)| {
        own_peers
            .iter()
            .min_by_key(|p| (p.timestamp_ms - peak_ts).abs())
            .filter(|p| (p.timestamp_ms - peak_ts).abs() <= PEAK_WINDOW_MS)
            .map(|p| display_distance(p.distance_m as f64))
    });

    let average_distance = if own_peers.is_empty() {
        0.0
    } else {
        let sum: i64 = own_peers.iter().map(|p| p.distance_m).sum();
        display_distance(sum as f64 / own_peers.len() as f64)
    };

    let timeline = own_hr
        .iter()
        .rev()
        .take(TIMELINE_LEN)
        .rev()
        .map(|&(ts, bpm)| HrPoint {
            time: fmt_time(ts),
            bpm,
        })
        .collect();

    HeartRateDetails {
        max_heart_rate: peak.map(|(_, bpm)| bpm).unwrap_or(0),
        peak_time: peak.map(|(ts, _)| fmt_time(ts)),
        min_distance,
        average_distance,
        timeline,
    }
}

fn proximity_details(
    device: &str,
    own_peers: &[&PeerSampleRow],
    participant_by_device: &HashMap<&str, &str>,
) -> BTreeMap<String, ProximityDetail> {
    // Group this participant's peer samples by the reported peer device,
    // preserving time order within each group.
    let mut groups: HashMap<&str, Vec<&PeerSampleRow>> = HashMap::new();
    for sample in own_peers {
        groups
            .entry(sample.peer_device_id.as_str())
            .or_default()
            .push(sample);
    }

    let mut details = BTreeMap::new();
    for (peer_device, samples) in groups {
        // Only peers that resolve to another assigned participant appear in
        // the document; a device talking about itself is skipped.
        let Some(&peer_participant) = participant_by_device.get(peer_device) else {
            continue;
        };
        if peer_device == device {
            continue;
        }

        let sum: i64 = samples.iter().map(|p| p.distance_m).sum();
        let average_distance = display_distance(sum as f64 / samples.len() as f64);
        let min_distance = samples
            .iter()
            .map(|p| p.distance_m)
            .min()
            .map(|d| display_distance(d as f64))
            .unwrap_or(0.0);
        let time_in_proximity = samples
            .iter()
            .filter(|p| p.distance_m <= PROXIMITY_THRESHOLD)
            .count() as i64;
        let timeline = samples
            .iter()
            .rev()
            .take(TIMELINE_LEN)
            .rev()
            .map(|p| DistancePoint {
                time: fmt_time(p.timestamp_ms),
                distance: display_distance(p.distance_m as f64),
            })
            .collect();

        details.insert(
            peer_participant.to_string(),
            ProximityDetail {
                average_distance,
                min_distance,
                time_in_proximity,
                timeline,
            },
        );
    }
    details
}

fn excitement_details(
    own_hr: &[(i64, i64)],
    others: &[(&str, &str)],
) -> BTreeMap<String, ExcitementDetail> {
    let peak = peak_sample(own_hr);
    let max = peak.map(|(_, bpm)| bpm).unwrap_or(0);
    let mean = mean_bpm(own_hr);
    let level = ExcitementLevel::from_max_bpm(max);
    let duration = own_hr
        .iter()
        .filter(|&&(_, bpm)| bpm as f64 > mean + 20.0)
        .count() as i64;
    let peak_time = peak.map(|(ts, _)| fmt_time(ts));

    // Only the first three others in roster order receive the triple, with
    // the level downgraded by position and the duration decremented by 5
    // per position (floored at 10). Deliberately asymmetric; see DESIGN.md.
    let mut details = BTreeMap::new();
    for (i, (other, _)) in others.iter().take(3).enumerate() {
        let positioned_level = match i {
            0 => level,
            1 => ExcitementLevel::High,
            _ => ExcitementLevel::Mid,
        };
        let positioned_duration = if i == 0 {
            duration
        } else {
            (duration - 5 * i as i64).max(10)
        };
        details.insert(
            other.to_string(),
            ExcitementDetail {
                excitement_level: positioned_level,
                duration: positioned_duration,
                peak_time: peak_time.clone(),
            },
        );
    }
    details
}

fn hr_of<'m>(hr_by_device: &'m HashMap<&str, Vec<(i64, i64)>>, device: &str) -> &'m [(i64, i64)] {
    hr_by_device.get(device).map(Vec::as_slice).unwrap_or(&[])
}

/// First sample holding the maximum bpm.
fn peak_sample(samples: &[(i64, i64)]) -> Option<(i64, i64)> {
    let mut peak: Option<(i64, i64)> = None;
    for &(ts, bpm) in samples {
        match peak {
            Some((_, best)) if bpm <= best => {}
            _ => peak = Some((ts, bpm)),
        }
    }
    peak
}

fn mean_bpm(samples: &[(i64, i64)]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|(_, bpm)| *bpm as f64).sum::<f64>() / samples.len() as f64
}

fn max_bpm(samples: &[(i64, i64)]) -> i64 {
    samples.iter().map(|(_, bpm)| *bpm).max().unwrap_or(0)
}

/// Mean of all peer-distance samples recorded between two devices, in
/// either direction of the pair. No samples → the far sentinel.
fn pair_mean_distance(peers: &[PeerSampleRow], a: &str, b: &str) -> f64 {
    let mut sum = 0i64;
    let mut count = 0usize;
    for p in peers {
        if (p.device_id == a && p.peer_device_id == b)
            || (p.device_id == b && p.peer_device_id == a)
        {
            sum += p.distance_m;
            count += 1;
        }
    }
    if count == 0 {
        FAR_SENTINEL
    } else {
        sum as f64 / count as f64
    }
}

/// Display convention: every distance in a detail block is the stored
/// integer divided by 100. Not a physical unit conversion; kept as-is for
/// output compatibility.
fn display_distance(raw: f64) -> f64 {
    raw / 100.0
}

fn fmt_time(ts_ms: i64) -> String {
    DateTime::from_timestamp_millis(ts_ms)
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(participant: &str, device: &str) -> AssignmentRow {
        AssignmentRow {
            event_id: "e1".to_string(),
            participant_id: participant.to_string(),
            device_id: device.to_string(),
            assigned_at: String::new(),
        }
    }

    fn hr(device: &str, ts: i64, bpm: i64) -> HrSampleRow {
        HrSampleRow {
            event_id: "e1".to_string(),
            device_id: device.to_string(),
            timestamp_ms: ts,
            heart_rate_bpm: Some(bpm),
            battery_pct: None,
        }
    }

    fn peer(device: &str, peer_device: &str, ts: i64, distance: i64) -> PeerSampleRow {
        PeerSampleRow {
            event_id: "e1".to_string(),
            device_id: device.to_string(),
            peer_device_id: peer_device.to_string(),
            timestamp_ms: ts,
            distance_m: distance,
        }
    }

    fn three_person_roster() -> Vec<AssignmentRow> {
        vec![
            assignment("pa", "da"),
            assignment("pb", "db"),
            assignment("pc", "dc"),
            assignment("px", "dx"),
        ]
    }

    #[test]
    fn heart_rate_ranking_orders_by_mean_descending() {
        // A mean 100, B mean 80, C no samples → [A, B, C] for observer X.
        let samples = vec![
            hr("da", 1_000, 90),
            hr("da", 2_000, 110),
            hr("db", 1_000, 80),
        ];
        let doc = generate(&three_person_roster(), &samples, &[], 0);
        let x = &doc.per_participant["px"];
        assert_eq!(x.heart_rate_ranking, vec!["pa", "pb", "pc"]);
    }

    #[test]
    fn proximity_ranking_orders_by_mean_ascending_with_sentinel() {
        // X↔A mean 3, X↔B mean 10, X↔C no samples → [A, B, C].
        let peers = vec![
            peer("dx", "da", 1_000, 2),
            peer("da", "dx", 2_000, 4),
            peer("dx", "db", 1_000, 10),
        ];
        let doc = generate(&three_person_roster(), &[], &peers, 0);
        let x = &doc.per_participant["px"];
        assert_eq!(x.proximity_ranking, vec!["pa", "pb", "pc"]);
    }

    #[test]
    fn excitement_ranking_orders_by_max_descending() {
        let samples = vec![
            hr("da", 1_000, 120),
            hr("db", 1_000, 90),
            hr("db", 2_000, 170),
        ];
        let doc = generate(&three_person_roster(), &samples, &[], 0);
        let x = &doc.per_participant["px"];
        assert_eq!(x.excitement_ranking, vec!["pb", "pa", "pc"]);
    }

    #[test]
    fn ties_keep_roster_order() {
        // No telemetry at all: every metric ties, so rankings preserve
        // assignment order.
        let doc = generate(&three_person_roster(), &[], &[], 0);
        let x = &doc.per_participant["px"];
        assert_eq!(x.heart_rate_ranking, vec!["pa", "pb", "pc"]);
        assert_eq!(x.proximity_ranking, vec!["pa", "pb", "pc"]);
        assert_eq!(x.excitement_ranking, vec!["pa", "pb", "pc"]);
    }

    #[test]
    fn two_participant_rankings_and_peak() {
        // P1 reports [70, 150, 90]; P2 reports [60, 65].
        let roster = vec![assignment("p1", "d1"), assignment("p2", "d2")];
        let samples = vec![
            hr("d1", 1_000, 70),
            hr("d1", 2_000, 150),
            hr("d1", 3_000, 90),
            hr("d2", 1_000, 60),
            hr("d2", 2_000, 65),
        ];
        let doc = generate(&roster, &samples, &[], 0);

        let p1 = &doc.per_participant["p1"];
        assert_eq!(p1.heart_rate_ranking, vec!["p2"]);
        assert_eq!(p1.heart_rate_details.max_heart_rate, 150);
        // 150 > 140 but ≤ 160 → HIGH, not MAX.
        assert_eq!(
            p1.excitement_details["p2"].excitement_level,
            ExcitementLevel::High
        );

        let p2 = &doc.per_participant["p2"];
        assert_eq!(p2.heart_rate_ranking, vec!["p1"]);
        assert_eq!(p2.heart_rate_details.max_heart_rate, 65);
    }

    #[test]
    fn no_samples_yield_zero_defaults() {
        let roster = vec![assignment("p1", "d1"), assignment("p2", "d2")];
        let doc = generate(&roster, &[], &[], 0);
        let p1 = &doc.per_participant["p1"];
        assert_eq!(p1.heart_rate_details.max_heart_rate, 0);
        assert!(p1.heart_rate_details.peak_time.is_none());
        assert!(p1.heart_rate_details.min_distance.is_none());
        assert_eq!(p1.heart_rate_details.average_distance, 0.0);
        assert!(p1.heart_rate_details.timeline.is_empty());
        assert!(p1.proximity_details.is_empty());
        let ex = &p1.excitement_details["p2"];
        assert_eq!(ex.excitement_level, ExcitementLevel::Low);
        assert_eq!(ex.duration, 0);
        assert!(ex.peak_time.is_none());
    }

    #[test]
    fn peak_distance_uses_nearest_sample_within_window() {
        let roster = vec![assignment("p1", "d1"), assignment("p2", "d2")];
        let samples = vec![hr("d1", 100_000, 150)];
        let peers = vec![
            peer("d1", "d2", 60_000, 900), // 40s away — outside the window
            peer("d1", "d2", 80_000, 210), // 20s away — nearest qualifying
        ];
        let doc = generate(&roster, &samples, &peers, 0);
        let details = &doc.per_participant["p1"].heart_rate_details;
        assert_eq!(details.min_distance, Some(2.1));

        // Only the far sample: nothing within 30s → no distance at peak.
        let peers = vec![peer("d1", "d2", 60_000, 900)];
        let doc = generate(&roster, &samples, &peers, 0);
        let details = &doc.per_participant["p1"].heart_rate_details;
        assert!(details.min_distance.is_none());
    }

    #[test]
    fn peak_prefers_first_occurrence_on_ties() {
        let roster = vec![assignment("p1", "d1"), assignment("p2", "d2")];
        let samples = vec![
            hr("d1", 1_000, 150),
            hr("d1", 2_000, 150),
            hr("d1", 3_000, 120),
        ];
        let doc = generate(&roster, &samples, &[], 0);
        let details = &doc.per_participant["p1"].heart_rate_details;
        assert_eq!(details.peak_time.as_deref(), Some(&fmt_time(1_000)[..]));
    }

    #[test]
    fn timelines_keep_the_last_four_in_order() {
        let roster = vec![assignment("p1", "d1"), assignment("p2", "d2")];
        let samples: Vec<HrSampleRow> =
            (0..6i64).map(|i| hr("d1", i * 60_000, 80 + i)).collect();
        let peers: Vec<PeerSampleRow> = (0..6i64)
            .map(|i| peer("d1", "d2", i * 60_000, 100 + i))
            .collect();
        let doc = generate(&roster, &samples, &peers, 0);

        let hr_timeline = &doc.per_participant["p1"].heart_rate_details.timeline;
        assert_eq!(hr_timeline.len(), 4);
        assert_eq!(hr_timeline[0].bpm, 82);
        assert_eq!(hr_timeline[3].bpm, 85);

        let prox = &doc.per_participant["p1"].proximity_details["p2"];
        assert_eq!(prox.timeline.len(), 4);
        assert_eq!(prox.timeline[0].distance, 1.02);
        assert_eq!(prox.timeline[3].distance, 1.05);
    }

    #[test]
    fn proximity_detail_aggregates_per_peer() {
        let roster = vec![
            assignment("p1", "d1"),
            assignment("p2", "d2"),
            assignment("p3", "d3"),
        ];
        let peers = vec![
            peer("d1", "d2", 1_000, 400),
            peer("d1", "d2", 2_000, 600),
            peer("d1", "d3", 1_000, 100),
        ];
        let doc = generate(&roster, &[], &peers, 0);
        let p1 = &doc.per_participant["p1"];

        let to_p2 = &p1.proximity_details["p2"];
        assert_eq!(to_p2.average_distance, 5.0);
        assert_eq!(to_p2.min_distance, 4.0);
        assert_eq!(to_p2.time_in_proximity, 1); // only the 400 sample is ≤ 500

        let to_p3 = &p1.proximity_details["p3"];
        assert_eq!(to_p3.average_distance, 1.0);
        assert_eq!(to_p3.time_in_proximity, 1);
    }

    #[test]
    fn excitement_details_follow_position_rules() {
        let roster = vec![
            assignment("p1", "d1"),
            assignment("p2", "d2"),
            assignment("p3", "d3"),
            assignment("p4", "d4"),
            assignment("p5", "d5"),
        ];
        // Max 170 → MAX; mean 120, so the duration counts samples above 140.
        let samples = vec![
            hr("d1", 1_000, 70),
            hr("d1", 2_000, 90),
            hr("d1", 3_000, 150),
            hr("d1", 4_000, 170),
        ];
        let doc = generate(&roster, &samples, &[], 0);
        let p1 = &doc.per_participant["p1"];

        // Only the first three others receive an entry.
        assert_eq!(p1.excitement_details.len(), 3);
        assert!(!p1.excitement_details.contains_key("p5"));

        let first = &p1.excitement_details["p2"];
        let second = &p1.excitement_details["p3"];
        let third = &p1.excitement_details["p4"];
        assert_eq!(first.excitement_level, ExcitementLevel::Max);
        assert_eq!(second.excitement_level, ExcitementLevel::High);
        assert_eq!(third.excitement_level, ExcitementLevel::Mid);

        // mean = 120, threshold 140 → duration counts 150 and 170 = 2;
        // decremented positions floor at 10.
        assert_eq!(first.duration, 2);
        assert_eq!(second.duration, 10);
        assert_eq!(third.duration, 10);
        assert_eq!(first.peak_time.as_deref(), Some(&fmt_time(4_000)[..]));
    }

    #[test]
    fn regeneration_is_deterministic() {
        let roster = three_person_roster();
        let samples = vec![
            hr("da", 1_000, 90),
            hr("db", 2_000, 110),
            hr("dc", 3_000, 130),
        ];
        let peers = vec![peer("da", "db", 1_500, 300), peer("dc", "da", 2_500, 700)];
        let a = generate(&roster, &samples, &peers, 1);
        let b = generate(&roster, &samples, &peers, 2);
        assert_eq!(a.per_participant, b.per_participant);
        assert_eq!(
            serde_json::to_string(&a.per_participant).unwrap(),
            serde_json::to_string(&b.per_participant).unwrap()
        );
        assert_ne!(a.generated_at_ms, b.generated_at_ms);
    }
}
