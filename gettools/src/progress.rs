use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

pub const CHUNK_SIZE: usize = 8 * 1024;

const MIB: f64 = 1024.0 * 1024.0;
const BAR_WIDTH: usize = 20;

/// State of a single transfer, handed to the progress hook after every chunk.
#[derive(Clone, Debug)]
pub struct ProgressState {
    pub chunk_index: u64,
    pub chunk_size: usize,
    pub bytes_read: u64,
    /// `None` when the server did not send a content length.
    pub total_bytes: Option<u64>,
    pub start: Instant,
}

impl ProgressState {
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            chunk_index: 0,
            chunk_size: CHUNK_SIZE,
            bytes_read: 0,
            total_bytes,
            start: Instant::now(),
        }
    }

    pub fn advance(&mut self, len: usize) {
        self.chunk_index += 1;
        self.bytes_read += len as u64;
    }

    pub fn snapshot(&self, elapsed: Duration) -> ProgressSnapshot {
        let total = self.total_bytes.unwrap_or_default();
        let percent = if total > 0 {
            (self.bytes_read.saturating_mul(100) / total).min(100) as u8
        } else {
            0
        };
        let transferred_mib = self.bytes_read as f64 / MIB;
        let secs = elapsed.as_secs_f64();
        let speed_mib_s = if secs > 0.0 {
            transferred_mib / secs
        } else {
            0.0
        };
        let eta_secs = if total > 0 && speed_mib_s > 0.0 {
            ((total as f64 - self.bytes_read as f64) / MIB / speed_mib_s).max(0.0)
        } else {
            0.0
        };
        ProgressSnapshot {
            percent,
            transferred_mib,
            speed_mib_s,
            eta_secs,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub transferred_mib: f64,
    pub speed_mib_s: f64,
    pub eta_secs: f64,
}

impl ProgressSnapshot {
    pub fn bar(&self) -> String {
        let mut bar = "=".repeat(self.percent as usize / 5);
        if self.percent < 100 {
            bar.push('>');
        }
        bar
    }
}

impl std::fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{:>4}% [{:width$}] {:.2} MB    {:.2} MB/s    ETA {:.0} seconds",
            self.percent,
            self.bar(),
            self.transferred_mib,
            self.speed_mib_s,
            self.eta_secs,
            width = BAR_WIDTH,
        )
    }
}

pub trait ProgressHook {
    fn on_progress(&mut self, state: &ProgressState);

    /// Called once the transfer ended, whether or not it succeeded.
    fn finish(&mut self) {}
}

impl<F: FnMut(&ProgressState)> ProgressHook for F {
    fn on_progress(&mut self, state: &ProgressState) {
        self(state)
    }
}

/// Redraws a single status line on stdout, one bar per transfer.
#[derive(Default)]
pub struct ConsoleReporter {
    bar: Option<ProgressBar>,
}

impl ConsoleReporter {
    fn start(total_bytes: Option<u64>) -> ProgressBar {
        let pb = ProgressBar::with_draw_target(total_bytes, ProgressDrawTarget::stdout());
        if let Ok(style) = ProgressStyle::with_template("{msg}") {
            pb.set_style(style);
        }
        pb
    }
}

impl ProgressHook for ConsoleReporter {
    fn on_progress(&mut self, state: &ProgressState) {
        if state.chunk_index == 0 {
            if let Some(pb) = self.bar.replace(Self::start(state.total_bytes)) {
                pb.finish();
            }
            return;
        }
        if let Some(pb) = &self.bar {
            pb.set_position(state.bytes_read);
            pb.set_message(state.snapshot(state.start.elapsed()).to_string());
        }
    }

    fn finish(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish();
        }
    }
}

#[derive(Default)]
pub struct NullReporter;

impl ProgressHook for NullReporter {
    fn on_progress(&mut self, _state: &ProgressState) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(bytes_read: u64, total_bytes: Option<u64>) -> ProgressState {
        ProgressState {
            bytes_read,
            total_bytes,
            ..ProgressState::new(total_bytes)
        }
    }

    #[test]
    fn test_unknown_total() {
        for total in [None, Some(0)] {
            let snap = state(4096, total).snapshot(Duration::from_secs(2));
            assert_eq!(snap.percent, 0);
            assert_eq!(snap.eta_secs, 0.0);
            assert_eq!(snap.bar(), ">");
        }
    }

    #[test]
    fn test_zero_elapsed() {
        let snap = state(1024, Some(2048)).snapshot(Duration::ZERO);
        assert_eq!(snap.percent, 50);
        assert_eq!(snap.speed_mib_s, 0.0);
        assert_eq!(snap.eta_secs, 0.0);
    }

    #[test]
    fn test_speed_and_eta() {
        let mib = 1024 * 1024;
        let snap = state(2 * mib, Some(10 * mib)).snapshot(Duration::from_secs(2));
        assert_eq!(snap.percent, 20);
        assert_eq!(snap.transferred_mib, 2.0);
        assert_eq!(snap.speed_mib_s, 1.0);
        assert_eq!(snap.eta_secs, 8.0);
        assert_eq!(snap.bar(), "====>");
    }

    #[test]
    fn test_overshoot_is_capped() {
        let snap = state(3000, Some(1000)).snapshot(Duration::from_secs(1));
        assert_eq!(snap.percent, 100);
        assert_eq!(snap.eta_secs, 0.0);
        assert_eq!(snap.bar(), "=".repeat(20));
    }

    #[test]
    fn test_line_layout() {
        let mib = 1024 * 1024;
        let line = state(mib, Some(4 * mib))
            .snapshot(Duration::from_secs(1))
            .to_string();
        assert_eq!(
            line,
            "  25% [=====>              ] 1.00 MB    1.00 MB/s    ETA 3 seconds"
        );
    }

    #[test]
    fn test_closure_hook() {
        let mut seen = vec![];
        let mut hook = |state: &ProgressState| seen.push(state.chunk_index);
        let mut state = ProgressState::new(None);
        hook.on_progress(&state);
        state.advance(CHUNK_SIZE);
        hook.on_progress(&state);
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_console_reporter_ends_each_transfer() {
        let mut reporter = ConsoleReporter::default();
        let mut state = ProgressState::new(Some(2 * CHUNK_SIZE as u64));
        reporter.on_progress(&state);
        state.advance(CHUNK_SIZE);
        reporter.on_progress(&state);
        let pb = reporter.bar.as_ref().unwrap();
        assert_eq!(pb.position(), CHUNK_SIZE as u64);
        assert_eq!(pb.length(), Some(2 * CHUNK_SIZE as u64));
        reporter.finish();
        assert!(reporter.bar.is_none());
    }
}
