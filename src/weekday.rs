//! Weekday x direction contingency table

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::{Direction, EquilibriumError, Result};

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Direction counts per weekday, keyed by each bar's own timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekdayTable {
    counts: [[usize; 3]; 7],
}

/// One rendered row of a [`WeekdayTable`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeekdayRow {
    pub weekday: Weekday,
    pub up: usize,
    pub down: usize,
    pub neutral: usize,
    pub total: usize,
    pub up_pct: f64,
    pub down_pct: f64,
    pub neutral_pct: f64,
}

impl WeekdayTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, weekday: Weekday, direction: Direction) {
        self.counts[weekday.num_days_from_monday() as usize][direction.index()] += 1;
    }

    /// Undo a previous [`add`](Self::add). Fails if the cell is already empty.
    #[inline]
    pub fn remove(&mut self, weekday: Weekday, direction: Direction) -> Result<()> {
        let cell = &mut self.counts[weekday.num_days_from_monday() as usize][direction.index()];
        *cell = cell
            .checked_sub(1)
            .ok_or(EquilibriumError::InvalidValue("removing a bar that was never added"))?;
        Ok(())
    }

    #[inline]
    pub fn count(&self, weekday: Weekday, direction: Direction) -> usize {
        self.counts[weekday.num_days_from_monday() as usize][direction.index()]
    }

    #[inline]
    pub fn row_total(&self, weekday: Weekday) -> usize {
        self.counts[weekday.num_days_from_monday() as usize].iter().sum()
    }

    /// Row percentages in UP, DOWN, NEUTRAL order. Empty rows are all zero.
    pub fn row_percentages(&self, weekday: Weekday) -> [f64; 3] {
        let total = self.row_total(weekday);
        if total == 0 {
            return [0.0; 3];
        }
        let row = self.counts[weekday.num_days_from_monday() as usize];
        row.map(|count| count as f64 * 100.0 / total as f64)
    }

    pub fn has_weekend_data(&self) -> bool {
        self.row_total(Weekday::Sat) > 0 || self.row_total(Weekday::Sun) > 0
    }

    pub fn row(&self, weekday: Weekday) -> WeekdayRow {
        let [up, down, neutral] = self.counts[weekday.num_days_from_monday() as usize];
        let [up_pct, down_pct, neutral_pct] = self.row_percentages(weekday);
        WeekdayRow {
            weekday,
            up,
            down,
            neutral,
            total: up + down + neutral,
            up_pct,
            down_pct,
            neutral_pct,
        }
    }

    /// All seven rows, Monday first
    pub fn rows(&self) -> Vec<WeekdayRow> {
        WEEK.iter().map(|&weekday| self.row(weekday)).collect()
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::{Down, Neutral, Up};

    #[test]
    fn test_counts_and_percentages() {
        let mut table = WeekdayTable::new();
        table.add(Weekday::Mon, Up);
        table.add(Weekday::Mon, Up);
        table.add(Weekday::Mon, Down);
        table.add(Weekday::Mon, Neutral);

        assert_eq!(table.count(Weekday::Mon, Up), 2);
        assert_eq!(table.row_total(Weekday::Mon), 4);
        assert_eq!(table.row_percentages(Weekday::Mon), [50.0, 25.0, 25.0]);
    }

    #[test]
    fn test_percentages_exact_at_round_values() {
        let mut table = WeekdayTable::new();
        for i in 0..20 {
            table.add(Weekday::Wed, if i < 11 { Up } else { Down });
        }
        assert_eq!(table.row_percentages(Weekday::Wed), [55.0, 45.0, 0.0]);
    }

    #[test]
    fn test_empty_row_is_zero() {
        let table = WeekdayTable::new();
        assert_eq!(table.row_percentages(Weekday::Thu), [0.0, 0.0, 0.0]);
        let row = table.row(Weekday::Thu);
        assert_eq!(row.total, 0);
        assert_eq!(row.up_pct, 0.0);
    }

    #[test]
    fn test_rows_sum_to_hundred() {
        let mut table = WeekdayTable::new();
        let dirs = [Up, Down, Neutral, Up, Up, Down, Down];
        for (i, d) in dirs.iter().enumerate() {
            table.add(WEEK[i % 3], *d);
        }
        for row in table.rows() {
            if row.total > 0 {
                let sum = row.up_pct + row.down_pct + row.neutral_pct;
                assert!((sum - 100.0).abs() < 1e-9);
            } else {
                assert_eq!(row.up_pct + row.down_pct + row.neutral_pct, 0.0);
            }
        }
    }

    #[test]
    fn test_remove_and_weekend_detection() {
        let mut table = WeekdayTable::new();
        assert!(!table.has_weekend_data());
        table.add(Weekday::Sun, Down);
        assert!(table.has_weekend_data());
        table.remove(Weekday::Sun, Down).unwrap();
        assert!(!table.has_weekend_data());
        assert!(table.remove(Weekday::Sun, Down).is_err());
        assert_eq!(table, WeekdayTable::new());
        assert_eq!(table.rows().len(), 7);
        assert_eq!(table.rows()[0].weekday, Weekday::Mon);
    }
}
