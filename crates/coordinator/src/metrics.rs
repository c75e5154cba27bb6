//! Mirror metrics

/// Counters for a single mirror
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MirrorMetrics {
    /// Lines written
    pub write_count: u64,
    /// Failed writes (the line is lost, the mirror stays)
    pub failure_count: u64,
}

impl MirrorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_write_count(&mut self) {
        self.write_count += 1;
    }

    pub fn inc_failure_count(&mut self) {
        self.failure_count += 1;
    }
}
