//! Query windows: lookback clamping and sampling resolution.

use chrono::{DateTime, Duration, Utc};

/// Hard lookback ceiling in seconds: 89 days 23:59:59.
pub const MAX_LOOKBACK_SECS: i64 = 90 * 24 * 3600 - 1;

/// Returns the earliest queryable instant for a window ending at `end`.
pub fn lookback_limit(end: DateTime<Utc>) -> DateTime<Utc> {
    end - Duration::seconds(MAX_LOOKBACK_SECS)
}

/// Closed time interval `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Returns the window with start moved forward to the lookback limit if it lies further in the past.
    pub fn clamped(self) -> Self {
        Self {
            start: self.start.max(lookback_limit(self.end)),
            end: self.end,
        }
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start <= time && time <= self.end
    }

    /// Returns the sampling step for telemetry series over this window.
    ///
    /// Long windows are sampled coarser to bound the number of points.
    pub fn sampling_interval(&self) -> Duration {
        let span = self.span();
        if span > Duration::days(1) {
            Duration::minutes(15)
        } else if span > Duration::hours(6) {
            Duration::minutes(5)
        } else {
            Duration::minutes(1)
        }
    }

    /// Returns sample timestamps from start to end inclusive, stepped by the sampling interval.
    pub fn sample_times(&self) -> Vec<DateTime<Utc>> {
        let step = self.sampling_interval();
        let mut times = Vec::new();
        let mut current = self.start;
        while current <= self.end {
            times.push(current);
            current = current + step;
        }
        times
    }
}

/// Metrics query window. Explicit bounds take precedence over the duration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsQuery {
    /// Window length in minutes ending at `end`, zero or absent means the default length.
    pub minutes: Option<u32>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl MetricsQuery {
    /// Window of the last `minutes` minutes.
    pub fn last_minutes(minutes: u32) -> Self {
        Self {
            minutes: Some(minutes),
            ..Self::default()
        }
    }

    /// Window with explicit bounds.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            minutes: None,
            start: Some(start),
            end: Some(end),
        }
    }

    /// Resolves query into a clamped window.
    pub fn resolve(&self, now: DateTime<Utc>, default_minutes: u32) -> TimeWindow {
        let end = self.end.unwrap_or(now);
        let start = self.start.unwrap_or_else(|| {
            let minutes = self.minutes.filter(|m| *m > 0).unwrap_or(default_minutes);
            end - Duration::minutes(minutes as i64)
        });
        TimeWindow::new(start, end).clamped()
    }
}
