//! Bookkeeping for error lines held at the top of the screen.
//!
//! Rows `[0, pinned)` hold error lines that reached the top of the scroll
//! region and are kept there. `pending` tracks error lines still moving
//! through the scroll region, oldest (closest to the pinned area) first.
//! A pinned row is only given back to the scroll flow when the next line
//! is printed, by scrolling the whole screen once.

use std::collections::VecDeque;

/// What to do with the next line before it is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Every row but the last is pinned; the line is not shown.
    Drop,
    /// Print the line with the scroll region starting at `scroll_top`.
    Print { scroll_top: u16 },
}

/// Effect of a visibility timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The oldest pinned row is released with the next printed line.
    ReleaseScheduled,
    /// The line timed out before reaching the pinned area.
    Forgotten(Option<u16>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinState {
    rows: u16,
    pinned: u16,
    pending: VecDeque<u16>,
    release_quota: u16,
}

impl PinState {
    pub fn new(rows: u16) -> Self {
        Self {
            rows,
            pinned: 0,
            pending: VecDeque::new(),
            release_quota: 0,
        }
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn pinned(&self) -> u16 {
        self.pinned
    }

    pub fn pending(&self) -> &VecDeque<u16> {
        &self.pending
    }

    pub fn release_quota(&self) -> u16 {
        self.release_quota
    }

    pub fn is_releasing(&self) -> bool {
        self.release_quota > 0
    }

    pub fn admit(&self) -> Admission {
        if self.is_releasing() {
            Admission::Print { scroll_top: 0 }
        } else if self.pinned >= self.rows.saturating_sub(1) {
            Admission::Drop
        } else {
            Admission::Print {
                scroll_top: self.pinned,
            }
        }
    }

    /// Updates the state after a line was printed and the scroll region
    /// moved up by one row. Returns the row now holding the line if it was
    /// recorded as an error line.
    pub fn line_printed(&mut self, pinnable: bool) -> Option<u16> {
        let releasing = self.is_releasing();

        for row in self.pending.iter_mut() {
            *row = row.saturating_sub(1);
        }

        let recorded = if pinnable {
            let row = self.rows.saturating_sub(2);
            self.pending.push_back(row);
            Some(row)
        } else {
            None
        };

        if releasing {
            self.pinned -= 1;
            self.release_quota -= 1;
        }

        while self.pending.front() == Some(&self.pinned) {
            self.pending.pop_front();
            self.pinned += 1;
        }

        debug_assert!(self.invariants_hold(), "{self:?}");
        recorded
    }

    /// Scroll region to apply once a line is done, or `None` while a
    /// release keeps the whole screen scrolling.
    pub fn scroll_region(&self) -> Option<(u16, u16)> {
        (!self.is_releasing()).then(|| (self.pinned, self.rows.saturating_sub(1)))
    }

    /// Handles the visibility timeout of the oldest recorded line.
    ///
    /// Timeouts fire in recording order, so the expiring line is the oldest
    /// pinned row that has no release scheduled yet, if there is one, and
    /// the oldest pending line otherwise.
    pub fn expire(&mut self) -> Expiry {
        let expiry = if self.pinned > self.release_quota {
            self.release_quota += 1;
            Expiry::ReleaseScheduled
        } else {
            Expiry::Forgotten(self.pending.pop_front())
        };

        debug_assert!(self.invariants_hold(), "{self:?}");
        expiry
    }

    pub fn invariants_hold(&self) -> bool {
        let rows_ok = self.rows == 0 || self.pinned < self.rows;
        let pending_ok = self
            .pending
            .iter()
            .all(|row| *row >= self.pinned && *row < self.rows.max(1));
        let ordered = self
            .pending
            .iter()
            .zip(self.pending.iter().skip(1))
            .all(|(a, b)| a < b);
        rows_ok && pending_ok && ordered && self.release_quota <= self.pinned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn print(state: &mut PinState, pinnable: bool) -> Option<Option<u16>> {
        match state.admit() {
            Admission::Drop => None,
            Admission::Print { .. } => Some(state.line_printed(pinnable)),
        }
    }

    #[test]
    fn error_line_lands_above_bottom_row() {
        let mut state = PinState::new(10);
        assert_eq!(print(&mut state, true), Some(Some(8)));
        assert_eq!(state.pending(), &VecDeque::from([8]));
        assert_eq!(state.pinned(), 0);
        assert_eq!(state.scroll_region(), Some((0, 9)));
    }

    #[test]
    fn timeout_before_pinning_forgets_line() {
        let mut state = PinState::new(10);
        print(&mut state, true);

        assert_eq!(state.expire(), Expiry::Forgotten(Some(8)));
        assert!(state.pending().is_empty());
        assert_eq!(state.pinned(), 0);
        assert_eq!(state.release_quota(), 0);
    }

    #[test]
    fn error_line_is_pinned_then_released() {
        let mut state = PinState::new(10);
        print(&mut state, true);
        for _ in 0..7 {
            print(&mut state, false);
        }
        assert_eq!(state.pending(), &VecDeque::from([1]));
        assert_eq!(state.pinned(), 0);

        print(&mut state, false);
        assert_eq!(state.pinned(), 1);
        assert!(state.pending().is_empty());
        assert_eq!(state.scroll_region(), Some((1, 9)));

        print(&mut state, false);
        assert_eq!(state.pinned(), 1);
        assert_eq!(state.admit(), Admission::Print { scroll_top: 1 });

        assert_eq!(state.expire(), Expiry::ReleaseScheduled);
        assert_eq!(state.release_quota(), 1);
        assert_eq!(state.admit(), Admission::Print { scroll_top: 0 });

        print(&mut state, false);
        assert_eq!(state.pinned(), 0);
        assert_eq!(state.release_quota(), 0);
        assert_eq!(state.scroll_region(), Some((0, 9)));
    }

    #[test]
    fn full_pinned_area_drops_lines() {
        let mut state = PinState::new(3);
        print(&mut state, true);
        assert_eq!(state.pinned(), 0);
        print(&mut state, true);
        assert_eq!(state.pinned(), 2);
        assert_eq!(state.admit(), Admission::Drop);
        assert_eq!(print(&mut state, true), None);

        state.expire();
        assert_eq!(state.admit(), Admission::Print { scroll_top: 0 });
        assert_eq!(print(&mut state, false), Some(None));
        assert_eq!(state.pinned(), 1);
        assert_eq!(state.admit(), Admission::Print { scroll_top: 1 });
    }

    #[test]
    fn release_with_several_pinned_rows_keeps_whole_screen_scrolling() {
        let mut state = PinState::new(3);
        print(&mut state, true);
        print(&mut state, true);
        assert_eq!(state.pinned(), 2);

        state.expire();
        state.expire();
        assert_eq!(state.release_quota(), 2);
        assert_eq!(state.expire(), Expiry::Forgotten(None));
        assert_eq!(state.release_quota(), 2);

        print(&mut state, false);
        assert_eq!(state.scroll_region(), None);
        print(&mut state, false);
        assert_eq!(state.pinned(), 0);
        assert_eq!(state.scroll_region(), Some((0, 2)));
    }

    #[test]
    fn degenerate_heights_drop_everything() {
        for rows in [0, 1] {
            let mut state = PinState::new(rows);
            assert_eq!(state.admit(), Admission::Drop);
            assert_eq!(state.expire(), Expiry::Forgotten(None));
        }
    }

    /// Seeded xorshift so the sweep is reproducible.
    struct Rng(u64);

    impl Rng {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }
    }

    #[test]
    fn invariants_hold_over_random_sequences() {
        for seed in 1..=64u64 {
            let mut rng = Rng(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let rows = 2 + (rng.next() % 12) as u16;
            let mut state = PinState::new(rows);
            let mut armed = 0usize;

            for _ in 0..2_000 {
                let before = state.pinned();
                let releasing = state.is_releasing();
                match rng.next() % 4 {
                    0 if armed > 0 => {
                        state.expire();
                        armed -= 1;
                        assert_eq!(state.pinned(), before);
                    }
                    roll => {
                        let pinnable = roll == 1;
                        if let Some(recorded) = print(&mut state, pinnable) {
                            if recorded.is_some() {
                                armed += 1;
                            }
                            if !releasing {
                                assert!(state.pinned() >= before, "seed {seed}");
                            } else {
                                assert!(state.pinned() + 1 >= before, "seed {seed}");
                            }
                        }
                    }
                }
                assert!(state.invariants_hold(), "seed {seed}: {state:?}");
                let tracked = state.pinned() as usize + state.pending().len();
                assert_eq!(tracked, armed + state.release_quota() as usize, "seed {seed}");
            }
        }
    }
}
