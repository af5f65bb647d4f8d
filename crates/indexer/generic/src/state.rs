/// What the next cycle should do given the chain tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Fetch `count` blocks starting at `from` in parallel.
    CatchUp { from: u64, count: u64 },
    SingleStep(u64),
    Idle,
}

/// Scan pointer of one chain. Owned by the chain's task, which is its only
/// writer.
#[derive(Debug, Clone)]
pub struct ScanState {
    chain_id: u64,
    current: u64,
    catching_up: bool,
}

impl ScanState {
    pub fn new(chain_id: u64, current: u64) -> Self {
        Self {
            chain_id,
            current,
            catching_up: false,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Next block to process.
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Whether the last planned cycle was a catch-up batch.
    pub fn is_catching_up(&self) -> bool {
        self.catching_up
    }

    /// Drops the last plan; a cycle that fails before planning retries at the
    /// steady-state pace.
    pub fn reset_mode(&mut self) {
        self.catching_up = false;
    }

    pub fn advance(&mut self, blocks: u64) {
        self.current += blocks;
    }

    pub fn rewind(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    pub fn plan(&mut self, tip: u64, confirmations: u64, concurrency: u64) -> ScanMode {
        let mode = if concurrency > 1 && self.current + confirmations + concurrency < tip {
            ScanMode::CatchUp {
                from: self.current,
                count: concurrency,
            }
        } else if self.current + confirmations < tip {
            ScanMode::SingleStep(self.current)
        } else {
            ScanMode::Idle
        };
        self.catching_up = matches!(mode, ScanMode::CatchUp { .. });
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn far_behind_with_concurrency_catches_up() {
        let mut state = ScanState::new(1, 100);
        assert_eq!(
            state.plan(200, 6, 10),
            ScanMode::CatchUp {
                from: 100,
                count: 10
            }
        );
        assert!(state.is_catching_up());
    }

    #[test]
    fn near_frontier_single_steps() {
        let mut state = ScanState::new(1, 100);
        // 100 + 6 + 10 == 116, not below the tip.
        assert_eq!(state.plan(116, 6, 10), ScanMode::SingleStep(100));
        assert!(!state.is_catching_up());
        assert_eq!(state.plan(107, 6, 10), ScanMode::SingleStep(100));
    }

    #[test]
    fn concurrency_one_never_catches_up() {
        let mut state = ScanState::new(1, 0);
        assert_eq!(state.plan(1_000_000, 6, 1), ScanMode::SingleStep(0));
    }

    #[test]
    fn within_confirmations_is_idle() {
        let mut state = ScanState::new(1, 100);
        assert_eq!(state.plan(106, 6, 4), ScanMode::Idle);
        assert_eq!(state.plan(50, 6, 4), ScanMode::Idle);
    }

    #[test]
    fn rewind_stops_at_zero() {
        let mut state = ScanState::new(1, 0);
        state.rewind();
        assert_eq!(state.current(), 0);
        state.advance(3);
        state.rewind();
        assert_eq!(state.current(), 2);
    }

    #[test]
    fn reset_mode_clears_catch_up() {
        let mut state = ScanState::new(1, 100);
        state.plan(200, 6, 10);
        assert!(state.is_catching_up());
        state.reset_mode();
        assert!(!state.is_catching_up());
        assert_eq!(state.current(), 100);
    }
}
