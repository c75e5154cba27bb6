//! 就绪位掩码
//!
//! 每个必需事件源占一位；全部就绪后才允许第一次上电。
//! 这是唯一跨线程共享、需要加锁的状态。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MaskState {
    bits: u64,
    required: u64,
    next_bit: u32,
    announced: bool,
}

/// Shared readiness bitmask, one bit per mandatory source
#[derive(Debug, Clone, Default)]
pub struct ReadinessMask {
    inner: Arc<Mutex<MaskState>>,
}

impl ReadinessMask {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MaskState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand out the next bit and mark it required
    ///
    /// Returns `None` once all 64 bits are in use.
    pub fn register(&self) -> Option<u32> {
        let mut state = self.state();
        if state.next_bit >= u64::BITS {
            return None;
        }
        let bit = state.next_bit;
        state.next_bit += 1;
        state.required |= 1 << bit;
        Some(bit)
    }

    /// Set a bit; returns `true` exactly once, when the mask first becomes complete
    pub fn mark_ready(&self, bit: u32) -> bool {
        let mut state = self.state();
        state.bits |= 1 << bit;
        Self::take_announcement(&mut state)
    }

    /// Clear a bit. Never resets the announcement.
    pub fn mark_lost(&self, bit: u32) {
        self.state().bits &= !(1 << bit);
    }

    /// Returns `true` once if the mask is already complete (e.g. no required bits)
    pub fn announce_if_complete(&self) -> bool {
        Self::take_announcement(&mut self.state())
    }

    pub fn is_complete(&self) -> bool {
        let state = self.state();
        state.bits & state.required == state.required
    }

    pub fn is_ready(&self, bit: u32) -> bool {
        self.state().bits & (1 << bit) != 0
    }

    pub fn required_count(&self) -> u32 {
        self.state().required.count_ones()
    }

    fn take_announcement(state: &mut MaskState) -> bool {
        if state.announced || state.bits & state.required != state.required {
            return false;
        }
        state.announced = true;
        true
    }
}
