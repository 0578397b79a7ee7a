//! Reconstruction of powered-on segments from VM history and runtime accounting.

use chrono::{DateTime, Utc};

use crate::core::power_state::{OperationKind, PowerState};
use crate::core::record::HistoryEvent;
use crate::core::window::TimeWindow;

/// Contiguous powered-on interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Segment {
    /// Returns the overlap with window in whole seconds.
    pub fn overlap_secs(&self, window: &TimeWindow) -> u64 {
        let clamp_start = self.start.max(window.start);
        let clamp_end = self.end.min(window.end);
        if clamp_start < clamp_end {
            (clamp_end - clamp_start).num_seconds().max(0) as u64
        } else {
            0
        }
    }
}

/// Segments reconstructed from history.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentScan {
    /// Start/deallocate pairs in history order.
    pub closed: Vec<Segment>,
    /// Start of the trailing segment which has no deallocation yet.
    pub open_since: Option<DateTime<Utc>>,
    /// Entries skipped because of unparseable timestamps.
    pub malformed: usize,
    /// Deallocations which had no open start.
    pub unmatched_deallocations: usize,
}

impl SegmentScan {
    /// Walks history in stored order pairing each start with the next deallocation.
    ///
    /// A repeated start replaces the open one, a deallocation without open start is ignored.
    pub fn from_history(history: &[HistoryEvent]) -> Self {
        let mut scan = Self::default();
        for event in history {
            let time = match event.time() {
                Some(time) => time,
                None => {
                    scan.malformed += 1;
                    continue;
                }
            };
            match event.kind {
                OperationKind::Start => scan.open_since = Some(time),
                OperationKind::Deallocate => match scan.open_since.take() {
                    Some(start) => scan.closed.push(Segment { start, end: time }),
                    None => scan.unmatched_deallocations += 1,
                },
            }
        }
        scan
    }

    /// Returns all segments, closing the open one at `now` if VM is currently running.
    pub fn segments(&self, power_state: PowerState, now: DateTime<Utc>) -> Vec<Segment> {
        let mut segments = self.closed.clone();
        if let Some(start) = self.open_since {
            if power_state.is_running() {
                segments.push(Segment { start, end: now });
            }
        }
        segments
    }
}

/// Returns total powered-on seconds within the window, which is clamped to the lookback limit first.
pub fn total_runtime(segments: &[Segment], window: TimeWindow) -> u64 {
    let window = window.clamped();
    segments.iter().map(|segment| segment.overlap_secs(&window)).sum()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn start(secs: i64) -> HistoryEvent {
        HistoryEvent::new(OperationKind::Start, t(secs))
    }

    fn stop(secs: i64) -> HistoryEvent {
        HistoryEvent::new(OperationKind::Deallocate, t(secs))
    }

    #[test]
    fn pairs_starts_with_deallocations() {
        let scan = SegmentScan::from_history(&[start(0), stop(100), start(200), stop(260)]);
        assert_eq!(
            scan.closed,
            vec![Segment { start: t(0), end: t(100) }, Segment { start: t(200), end: t(260) }]
        );
        assert_eq!(scan.open_since, None);
        assert_eq!(total_runtime(&scan.closed, TimeWindow::new(t(0), t(1000))), 160);
    }

    #[test]
    fn window_clips_segments() {
        let scan = SegmentScan::from_history(&[start(0), stop(100), start(200), stop(260)]);
        assert_eq!(total_runtime(&scan.closed, TimeWindow::new(t(50), t(230))), 80);
        assert_eq!(total_runtime(&scan.closed, TimeWindow::new(t(100), t(200))), 0);
        assert_eq!(total_runtime(&scan.closed, TimeWindow::new(t(300), t(200))), 0);
    }

    #[test]
    fn open_segment_counts_only_while_running() {
        let scan = SegmentScan::from_history(&[start(0), stop(10), start(100)]);
        assert_eq!(scan.open_since, Some(t(100)));
        let running = scan.segments(PowerState::Running, t(160));
        assert_eq!(total_runtime(&running, TimeWindow::new(t(0), t(1000))), 70);
        let deallocating = scan.segments(PowerState::Deallocating, t(160));
        assert_eq!(total_runtime(&deallocating, TimeWindow::new(t(0), t(1000))), 10);
    }

    #[test]
    fn unpaired_events_are_tolerated() {
        let scan = SegmentScan::from_history(&[stop(5), start(10), start(20), stop(50), stop(60)]);
        assert_eq!(scan.closed, vec![Segment { start: t(20), end: t(50) }]);
        assert_eq!(scan.unmatched_deallocations, 2);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let broken = HistoryEvent {
            kind: OperationKind::Deallocate,
            at: "not a time".to_string(),
        };
        let scan = SegmentScan::from_history(&[start(0), broken, stop(30)]);
        assert_eq!(scan.malformed, 1);
        assert_eq!(scan.closed, vec![Segment { start: t(0), end: t(30) }]);
    }

    #[test]
    fn partial_seconds_are_truncated() {
        let segment = Segment {
            start: t(0),
            end: t(10) + Duration::milliseconds(999),
        };
        assert_eq!(total_runtime(&[segment], TimeWindow::new(t(0), t(100))), 10);
    }
}
