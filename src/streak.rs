//! Consecutive-direction runs
//!
//! NEUTRAL is a direction class of its own: a NEUTRAL bar ends an UP or DOWN
//! run and starts (or extends) a NEUTRAL run.
//!
//! Two trackers are provided:
//! - [`StreakTracker`] folds an append-only sequence (batch rescans, session
//!   windows).
//! - [`RollingStreaks`] also drops bars from the front, for sliding windows.
//!
//! Both report the same longest runs for the same final window.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::Direction;

/// Longest run seen per direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongestStreaks {
    pub up: usize,
    pub down: usize,
    pub neutral: usize,
}

impl LongestStreaks {
    #[inline]
    pub fn get(&self, direction: Direction) -> usize {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Neutral => self.neutral,
        }
    }

    #[inline]
    fn raise(&mut self, direction: Direction, len: usize) {
        let slot = match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
            Direction::Neutral => &mut self.neutral,
        };
        *slot = (*slot).max(len);
    }
}

// ============================================================
// APPEND-ONLY TRACKER
// ============================================================

/// Streak state for a sequence that only grows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreakTracker {
    current: Option<(Direction, usize)>,
    longest: LongestStreaks,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full rescan of a direction sequence
    pub fn scan<I: IntoIterator<Item = Direction>>(directions: I) -> Self {
        let mut tracker = Self::new();
        for direction in directions {
            tracker.push(direction);
        }
        tracker
    }

    /// Fold one more bar
    #[inline]
    pub fn push(&mut self, direction: Direction) {
        let len = match self.current {
            Some((current, len)) if current == direction => len + 1,
            _ => 1,
        };
        self.current = Some((direction, len));
        self.longest.raise(direction, len);
    }

    /// Direction and length of the run the last bar belongs to
    #[inline]
    pub fn current(&self) -> Option<(Direction, usize)> {
        self.current
    }

    #[inline]
    pub fn longest(&self) -> LongestStreaks {
        self.longest
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================
// SLIDING TRACKER
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    direction: Direction,
    len: usize,
}

/// Streak state for a window that grows at the back and shrinks at the front.
///
/// The window is stored run-length encoded. Each direction keeps a monotonic
/// queue of run ids whose lengths strictly decrease from front to back, so the
/// longest run of a direction is always at the front of its queue. Only the
/// newest run ever grows and only the oldest run ever shrinks, which keeps
/// both operations amortized O(1).
#[derive(Debug, Clone, Default)]
pub struct RollingStreaks {
    runs: VecDeque<Run>,
    /// Id of `runs[0]`; ids grow by one per run ever started
    base: u64,
    maxima: [VecDeque<u64>; 3],
}

impl RollingStreaks {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn len_of(runs: &VecDeque<Run>, base: u64, id: u64) -> usize {
        runs[(id - base) as usize].len
    }

    /// Append a bar at the newest end of the window
    pub fn push_back(&mut self, direction: Direction) {
        match self.runs.back_mut() {
            Some(run) if run.direction == direction => run.len += 1,
            _ => self.runs.push_back(Run { direction, len: 1 }),
        }
        let id = self.base + self.runs.len() as u64 - 1;
        let len = self.runs[self.runs.len() - 1].len;

        let runs = &self.runs;
        let base = self.base;
        let queue = &mut self.maxima[direction.index()];
        while let Some(&back) = queue.back() {
            if back == id || Self::len_of(runs, base, back) <= len {
                queue.pop_back();
            } else {
                break;
            }
        }
        queue.push_back(id);
    }

    /// Drop the oldest bar of the window, returning its direction
    pub fn pop_front(&mut self) -> Option<Direction> {
        let front = self.runs.front_mut()?;
        front.len -= 1;
        let direction = front.direction;
        let remaining = front.len;

        let base = self.base;
        let queue = &mut self.maxima[direction.index()];
        if remaining == 0 {
            self.runs.pop_front();
            if queue.front() == Some(&base) {
                queue.pop_front();
            }
            self.base += 1;
        } else if queue.front() == Some(&base) {
            // a younger run at least as long now dominates the shrunken front
            if let Some(&next) = queue.get(1) {
                if Self::len_of(&self.runs, base, next) >= remaining {
                    queue.pop_front();
                }
            }
        }
        Some(direction)
    }

    /// Longest run of `direction` inside the window
    #[inline]
    pub fn longest_of(&self, direction: Direction) -> usize {
        self.maxima[direction.index()]
            .front()
            .map_or(0, |&id| Self::len_of(&self.runs, self.base, id))
    }

    pub fn longest(&self) -> LongestStreaks {
        LongestStreaks {
            up: self.longest_of(Direction::Up),
            down: self.longest_of(Direction::Down),
            neutral: self.longest_of(Direction::Neutral),
        }
    }

    /// Longest runs the window would have after appending `direction` and,
    /// when `evict` is set, dropping the oldest bar. The tracker is not touched.
    ///
    /// Only the newest and the oldest run can change length, so the answer
    /// per direction comes from at most three queue entries.
    pub fn longest_after(&self, direction: Direction, evict: bool) -> LongestStreaks {
        let newest = self.runs.len().checked_sub(1).map(|i| self.base + i as u64);
        let extends = self.runs.back().is_some_and(|run| run.direction == direction);
        let adjusted = |id: u64| {
            let mut len = Self::len_of(&self.runs, self.base, id);
            if extends && Some(id) == newest {
                len += 1;
            }
            if evict && id == self.base {
                len -= 1;
            }
            len
        };

        let mut longest = LongestStreaks::default();
        for candidate in Direction::ALL {
            let queue = &self.maxima[candidate.index()];
            let mut best = 0;
            if let Some(&front) = queue.front() {
                best = adjusted(front);
                if evict && front == self.base {
                    if let Some(&next) = queue.get(1) {
                        best = best.max(adjusted(next));
                    }
                }
            }
            if let Some(&back) = queue.back() {
                best = best.max(adjusted(back));
            }
            if candidate == direction && !extends {
                best = best.max(1);
            }
            longest.raise(candidate, best);
        }
        longest
    }

    /// Direction and length of the newest run
    pub fn current(&self) -> Option<(Direction, usize)> {
        self.runs.back().map(|run| (run.direction, run.len))
    }

    /// Number of bars in the window
    pub fn len(&self) -> usize {
        self.runs.iter().map(|run| run.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================
// TESTS
// ============================================================
