//! Settlement reporting periods.

use chrono::{DateTime, Duration, Utc};

/// Half-open reporting interval `[period_start, period_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementWindow {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl SettlementWindow {
    /// Window for a run at `now`: the end anchors to the current UTC
    /// midnight and reaches back `lookback_days`, so re-runs within the same
    /// day upsert the same keyed rows.
    pub fn for_run(now: DateTime<Utc>, lookback_days: i64) -> Self {
        let period_end = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(now);
        Self {
            period_start: period_end - Duration::days(lookback_days.max(1)),
            period_end,
        }
    }
}

/// One aggregated merchant-liability row inside a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRow {
    pub tenant: String,
    pub merchant_account: String,
    pub net_points: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    fn window_anchors_to_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 17, 45, 9).unwrap();
        let window = SettlementWindow::for_run(now, 1);
        assert_eq!(
            window.period_end,
            Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap()
        );
        assert_eq!(
            window.period_start,
            Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap()
        );
    }

    #[rstest]
    fn lookback_is_clamped_to_at_least_one_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 3, 0, 0).unwrap();
        let window = SettlementWindow::for_run(now, 0);
        assert_eq!(window.period_end - window.period_start, Duration::days(1));
    }

    #[rstest]
    fn same_day_runs_share_a_window() {
        let morning = Utc.with_ymd_and_hms(2026, 3, 10, 1, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2026, 3, 10, 23, 0, 0).unwrap();
        assert_eq!(
            SettlementWindow::for_run(morning, 7),
            SettlementWindow::for_run(evening, 7)
        );
    }
}
