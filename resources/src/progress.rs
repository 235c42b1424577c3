/// Counts finished resource operations of the active top-level request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTracker {
    processed: usize,
    total: usize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request with a fixed denominator.
    pub fn begin(&mut self, total: usize) {
        self.processed = 0;
        self.total = total;
    }

    /// Grows the denominator of the running request.
    pub fn extend(&mut self, by: usize) {
        self.total = self.total.saturating_add(by);
    }

    /// Records `by` finished operations and returns `(processed, total)`.
    ///
    /// Saturates at `total`.
    pub fn advance(&mut self, by: usize) -> (usize, usize) {
        let next = self.processed.saturating_add(by);
        if next > self.total {
            log::warn!(
                "Progress overflow: {} + {} exceeds total {}",
                self.processed,
                by,
                self.total
            );
        }
        self.processed = next.min(self.total);
        self.snapshot()
    }

    pub fn snapshot(&self) -> (usize, usize) {
        (self.processed, self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
