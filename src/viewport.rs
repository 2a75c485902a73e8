use crate::config::DEFAULT_OVERSCAN;

/// Visible index range reported by the render layer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewportReport {
    pub first_visible: usize,
    pub last_visible: usize,
    pub total_rows: usize,
}

impl ViewportReport {
    pub fn new(first_visible: usize, last_visible: usize, total_rows: usize) -> Self {
        Self {
            first_visible,
            last_visible,
            total_rows,
        }
    }
}

/// Whether the viewport touches either end of the window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportPosition {
    pub at_top: bool,
    pub at_bottom: bool,
}

impl Default for ViewportPosition {
    /// Nothing has been reported yet: a fresh view starts at the head
    fn default() -> Self {
        Self {
            at_top: true,
            at_bottom: false,
        }
    }
}

impl ViewportPosition {
    pub fn compute(report: ViewportReport, overscan: usize) -> Self {
        let overscan = overscan as i64;
        let first = report.first_visible as i64;
        let last = report.last_visible as i64;
        let total = report.total_rows as i64;

        Self {
            at_top: first - overscan <= 0,
            at_bottom: last + overscan >= total - 1,
        }
    }
}

/// Derives edge flags from reported ranges. Never fetches on its own.
#[derive(Debug)]
pub struct ViewportTracker {
    overscan: usize,
    position: ViewportPosition,
}

impl Default for ViewportTracker {
    fn default() -> Self {
        Self::new(DEFAULT_OVERSCAN)
    }
}

impl ViewportTracker {
    pub fn new(overscan: usize) -> Self {
        Self {
            overscan,
            position: ViewportPosition::default(),
        }
    }

    /// Record a new report. Returns whether either flag changed.
    pub fn update(&mut self, report: ViewportReport) -> bool {
        let next = ViewportPosition::compute(report, self.overscan);
        let changed = next != self.position;
        self.position = next;
        changed
    }

    pub fn position(&self) -> ViewportPosition {
        self.position
    }

    pub fn at_top(&self) -> bool {
        self.position.at_top
    }

    pub fn at_bottom(&self) -> bool {
        self.position.at_bottom
    }

    pub fn overscan(&self) -> usize {
        self.overscan
    }
}
