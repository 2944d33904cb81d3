use chrono::NaiveDate;
use microfocus_storage::{HistoryEntry, Statistics};

/// Default number of history entries kept
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Folds closed sessions into cumulative statistics and the bounded history
#[derive(Debug, Clone, Copy)]
pub struct StatisticsAggregator {
    history_limit: usize,
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl StatisticsAggregator {
    #[must_use]
    pub const fn new(history_limit: usize) -> Self {
        Self { history_limit }
    }

    /// Count one finished session of `duration_minutes` completed on `today`.
    ///
    /// A second session on the same calendar day extends the streak and adds to
    /// today's total; the first session of any other day restarts the streak at
    /// one and resets today's total to this session alone.
    pub fn record_completion(&self, stats: &mut Statistics, duration_minutes: i64, today: NaiveDate) {
        stats.total_sessions += 1;
        stats.total_focus_time += duration_minutes;

        if stats.last_session_date == Some(today) {
            stats.current_streak += 1;
            stats.today_focus_time += duration_minutes;
        } else {
            stats.current_streak = 1;
            stats.today_focus_time = duration_minutes;
        }

        stats.longest_streak = stats.longest_streak.max(stats.current_streak);
        stats.last_session_date = Some(today);
    }

    /// Prepend `entry`, dropping the oldest entries beyond the limit
    pub fn record_history(&self, history: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
        history.insert(0, entry);
        history.truncate(self.history_limit);
    }
}
