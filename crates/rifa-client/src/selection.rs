use std::collections::{BTreeSet, HashSet};

use rand::Rng;

use rifa_types::RESERVATION_HOLD_SECS;
use rifa_types::api::NumberBoard;

/// How a single number should be drawn on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberState {
    Available,
    Selected,
    Held,
    Sold,
}

/// Candidate ticket numbers for one raffle, before anything is reserved.
///
/// The countdown is advisory. The server enforces the real hold; this only
/// mirrors it so the buyer sees time running out.
#[derive(Debug, Clone)]
pub struct NumberSelection {
    total_numbers: u32,
    selected: BTreeSet<u32>,
    sold: HashSet<u32>,
    held: HashSet<u32>,
    remaining_secs: u32,
}

impl NumberSelection {
    pub fn new(total_numbers: u32) -> Self {
        Self {
            total_numbers,
            selected: BTreeSet::new(),
            sold: HashSet::new(),
            held: HashSet::new(),
            remaining_secs: 0,
        }
    }

    pub fn with_board(total_numbers: u32, board: &NumberBoard) -> Self {
        let mut selection = Self::new(total_numbers);
        selection.refresh(board);
        selection
    }

    /// Replace the sold and held sets after a fresh fetch. The selection is
    /// left alone; see [`NumberSelection::conflicts`].
    pub fn refresh(&mut self, board: &NumberBoard) {
        self.sold = board.sold_numbers.iter().copied().collect();
        self.held = board.reserved_numbers.iter().copied().collect();
    }

    pub fn total_numbers(&self) -> u32 {
        self.total_numbers
    }

    /// Selected numbers in ascending order.
    pub fn selected(&self) -> Vec<u32> {
        self.selected.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// Countdown as `mm:ss`.
    pub fn remaining_label(&self) -> String {
        format!("{:02}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }

    pub fn state_of(&self, number: u32) -> NumberState {
        if self.sold.contains(&number) {
            NumberState::Sold
        } else if self.selected.contains(&number) {
            NumberState::Selected
        } else if self.held.contains(&number) {
            NumberState::Held
        } else {
            NumberState::Available
        }
    }

    /// Flip `number` in the selection. Sold, held and out-of-range numbers
    /// are ignored. Returns whether the selection changed.
    pub fn toggle(&mut self, number: u32) -> bool {
        if !(1..=self.total_numbers).contains(&number) || self.is_taken(number) {
            return false;
        }
        if !self.selected.remove(&number) {
            self.selected.insert(number);
        }
        self.start_countdown();
        true
    }

    /// Add up to `count` random available numbers to the selection and
    /// return the ones drawn, ascending. Draws without replacement.
    pub fn quick_pick<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Vec<u32> {
        let mut available: Vec<u32> = (1..=self.total_numbers)
            .filter(|n| !self.is_taken(*n) && !self.selected.contains(n))
            .collect();

        let draws = count.min(available.len());
        let mut picked = Vec::with_capacity(draws);
        for _ in 0..draws {
            let idx = rng.random_range(0..available.len());
            picked.push(available.swap_remove(idx));
        }

        self.selected.extend(picked.iter().copied());
        self.start_countdown();
        picked.sort_unstable();
        picked
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.remaining_secs = 0;
    }

    /// Advance the countdown by one second. Returns `true` when it runs out,
    /// in which case the selection has been cleared.
    pub fn tick(&mut self) -> bool {
        if self.remaining_secs == 0 {
            return false;
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            self.selected.clear();
            return true;
        }
        false
    }

    pub fn total_amount(&self, price_per_number: f64) -> f64 {
        rifa_types::round_cents(self.selected.len() as f64 * price_per_number)
    }

    /// Selected numbers that the last refresh reports as sold or held.
    pub fn conflicts(&self) -> Vec<u32> {
        self.selected
            .iter()
            .copied()
            .filter(|n| self.is_taken(*n))
            .collect()
    }

    fn is_taken(&self, number: u32) -> bool {
        self.sold.contains(&number) || self.held.contains(&number)
    }

    // Starts once per selection; later changes do not extend it.
    fn start_countdown(&mut self) {
        if !self.selected.is_empty() && self.remaining_secs == 0 {
            self.remaining_secs = RESERVATION_HOLD_SECS as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn board(sold: &[u32], held: &[u32]) -> NumberBoard {
        NumberBoard {
            sold_numbers: sold.to_vec(),
            reserved_numbers: held.to_vec(),
            total_sold: sold.len(),
        }
    }

    #[test]
    fn test_toggle_skips_taken_numbers() {
        let mut sel = NumberSelection::with_board(50, &board(&[3], &[7]));
        assert!(!sel.toggle(3));
        assert!(!sel.toggle(7));
        assert!(!sel.toggle(0));
        assert!(!sel.toggle(51));

        assert!(sel.toggle(42));
        assert!(sel.toggle(4));
        assert_eq!(sel.selected(), vec![4, 42]);
        assert_eq!(sel.state_of(3), NumberState::Sold);
        assert_eq!(sel.state_of(7), NumberState::Held);
        assert_eq!(sel.state_of(4), NumberState::Selected);
        assert_eq!(sel.state_of(5), NumberState::Available);

        assert!(sel.toggle(42));
        assert_eq!(sel.selected(), vec![4]);
    }

    #[test]
    fn test_quick_pick_avoids_taken_and_selected() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut sel = NumberSelection::with_board(20, &board(&[1, 2, 3], &[4, 5]));
        sel.toggle(6);

        let picked = sel.quick_pick(10, &mut rng);
        assert_eq!(picked.len(), 10);
        for n in &picked {
            assert!(*n >= 7 && *n <= 20, "drew taken or selected number {}", n);
        }
        let unique: HashSet<u32> = picked.iter().copied().collect();
        assert_eq!(unique.len(), 10);
        assert_eq!(sel.len(), 11);
    }

    #[test]
    fn test_quick_pick_caps_at_available() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut sel = NumberSelection::with_board(5, &board(&[1], &[2]));
        assert_eq!(sel.quick_pick(10, &mut rng), vec![3, 4, 5]);
        assert!(sel.quick_pick(1, &mut rng).is_empty());
    }

    #[test]
    fn test_countdown_starts_once_and_clears_on_expiry() {
        let mut sel = NumberSelection::new(10);
        assert!(!sel.tick());
        assert_eq!(sel.remaining_secs(), 0);

        sel.toggle(1);
        assert_eq!(sel.remaining_secs(), 900);
        assert_eq!(sel.remaining_label(), "15:00");

        sel.tick();
        sel.toggle(2);
        assert_eq!(sel.remaining_secs(), 899);

        for _ in 0..898 {
            assert!(!sel.tick());
        }
        assert_eq!(sel.remaining_label(), "00:01");
        assert!(sel.tick());
        assert!(sel.is_empty());
        assert_eq!(sel.remaining_secs(), 0);
    }

    #[test]
    fn test_clear_resets_countdown() {
        let mut sel = NumberSelection::new(10);
        sel.toggle(3);
        sel.clear();
        assert!(sel.is_empty());
        assert_eq!(sel.remaining_secs(), 0);
    }

    #[test]
    fn test_amount_and_conflicts() {
        let mut sel = NumberSelection::new(300);
        for n in [4, 17, 42] {
            sel.toggle(n);
        }
        assert_eq!(sel.total_amount(10.0), 30.0);
        assert_eq!(sel.total_amount(0.1), 0.3);

        sel.refresh(&board(&[17], &[]));
        assert_eq!(sel.conflicts(), vec![17]);
        assert_eq!(sel.selected(), vec![4, 17, 42]);
    }
}
