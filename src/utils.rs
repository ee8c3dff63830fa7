use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running count printed to stderr every `interval` records.
pub struct ProgressCounter {
    label: &'static str,
    interval: u64,
    enabled: bool,
    count: AtomicU64,
}

impl ProgressCounter {
    pub fn new(label: &'static str, interval: u64, enabled: bool) -> Self {
        let counter = Self {
            label,
            interval: interval.max(1),
            enabled,
            count: AtomicU64::new(0),
        };
        counter.print(0);
        counter
    }

    pub fn inc(&self, delta: u64) -> u64 {
        let prev = self.count.fetch_add(delta, Ordering::SeqCst);
        let current = prev + delta;
        // Print if we crossed an interval boundary
        if prev / self.interval < current / self.interval {
            self.print(current);
        }
        current
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn finish(&self) {
        if self.enabled {
            self.print(self.count());
            eprintln!();
        }
    }

    fn print(&self, current: u64) {
        if !self.enabled {
            return;
        }
        eprint!("\r{}: {}", self.label, current);
        let _ = std::io::stderr().flush();
    }
}
