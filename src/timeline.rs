//! Timecode computation for the final timeline.
//!
//! Runs once, after every segment has reached a terminal status. Pure
//! functions over a snapshot of segments; nothing here reads or
//! mutates orchestrator state.

use std::collections::HashMap;

use crate::project::{Segment, TimelineItem};

/// Fixed gap inserted between consecutive speech segments, in ms.
pub const SEGMENT_GAP_MS: u64 = 300;

/// Compute start times for all rendered speech segments.
///
/// Iterates segments in order with a running cursor starting at 0.
/// Each text segment with a linked generation result is placed at the
/// cursor, which then advances by the clip duration plus
/// [`SEGMENT_GAP_MS`]. Markers neither consume nor advance the cursor;
/// their placement is resolved from mix metadata at mixdown time.
///
/// Returns `(segment_id, start_time_ms)` pairs for the placed segments.
pub fn speech_start_times(segments: &[Segment]) -> Vec<(String, u64)> {
    let mut cursor_ms: u64 = 0;
    let mut placements = Vec::new();

    for segment in segments {
        if !segment.kind.is_text() {
            continue;
        }
        let Some(generation) = &segment.generation else {
            continue;
        };
        placements.push((segment.id.clone(), cursor_ms));
        cursor_ms += generation.duration_ms + SEGMENT_GAP_MS;
    }

    placements
}

/// Apply computed placements to timeline items in one batch.
///
/// Items whose segment has no placement (markers, skipped segments)
/// are left untouched.
pub fn apply_placements(items: &mut [TimelineItem], placements: &[(String, u64)]) {
    let by_segment: HashMap<&str, u64> = placements
        .iter()
        .map(|(id, start)| (id.as_str(), *start))
        .collect();

    for item in items {
        if let Some(start) = by_segment.get(item.segment_id.as_str()) {
            item.start_time_ms = *start;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{GenerationResult, SegmentStatus, TimelineItem};

    fn completed_text(order: usize, duration_ms: u64) -> Segment {
        let mut segment = Segment::text(order, "host", "line", Some("voice_a".into()));
        segment.status = SegmentStatus::Completed;
        segment.generation = Some(GenerationResult {
            id: format!("gen-{order}"),
            asset_path: format!("/tmp/gen-{order}.wav").into(),
            sample_rate: 24_000,
            duration_ms,
        });
        segment
    }

    #[test]
    fn sequential_placement_with_gap() {
        let segments = vec![
            completed_text(0, 1_000),
            completed_text(1, 2_000),
            completed_text(2, 1_500),
        ];

        let placements = speech_start_times(&segments);
        let starts: Vec<u64> = placements.iter().map(|(_, s)| *s).collect();
        assert_eq!(starts, vec![0, 1_300, 3_600]);
    }

    #[test]
    fn markers_do_not_advance_cursor() {
        let mut sfx = Segment::sound_effect(1, "applause");
        sfx.status = SegmentStatus::Completed;

        let segments = vec![completed_text(0, 1_000), sfx, completed_text(2, 2_000)];

        let placements = speech_start_times(&segments);
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].1, 0);
        assert_eq!(placements[1].1, 1_300);
    }

    #[test]
    fn skipped_text_without_generation_is_not_placed() {
        let mut skipped = Segment::text(1, "guest", "line", Some("voice_b".into()));
        skipped.status = SegmentStatus::Skipped;

        let segments = vec![completed_text(0, 1_000), skipped, completed_text(2, 500)];
        let placements = speech_start_times(&segments);
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[1].1, 1_300);
    }

    #[test]
    fn empty_snapshot_yields_no_placements() {
        assert!(speech_start_times(&[]).is_empty());
    }

    #[test]
    fn apply_placements_updates_matching_items() {
        let segment = completed_text(0, 1_000);
        let generation = match &segment.generation {
            Some(g) => g.clone(),
            None => panic!("generation set above"),
        };
        let mut items = vec![
            TimelineItem::placeholder_clip(&segment.id, generation),
            TimelineItem::marker("other-segment", "applause", crate::project::Track::Effects),
        ];

        apply_placements(&mut items, &[(segment.id.clone(), 4_200)]);

        assert_eq!(items[0].start_time_ms, 4_200);
        assert_eq!(items[1].start_time_ms, 0);
    }
}
