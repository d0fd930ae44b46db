use std::time::Instant;
use tracing::info;

/// Logs completion of a fixed amount of work in steps of `step` percent.
pub struct ProgressCounter {
    label: String,
    total: usize,
    count: usize,
    step: usize,
    next_percent: usize,
    enabled: bool,
    start: Instant,
}

impl ProgressCounter {
    /// # Arguments
    ///
    /// * `enabled` - only the process that should talk passes `true`
    pub fn new(label: &str, total: usize, step: usize, enabled: bool) -> Self {
        let step = step.clamp(1, 100);
        ProgressCounter {
            label: label.to_string(),
            total,
            count: 0,
            step,
            next_percent: step,
            enabled,
            start: Instant::now(),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Record one finished item; returns the percentage if a report was due.
    pub fn tick(&mut self) -> Option<usize> {
        self.count += 1;
        if self.total == 0 {
            return None;
        }
        let percent = self.count * 100 / self.total;
        if percent < self.next_percent {
            return None;
        }
        while self.next_percent <= percent {
            self.next_percent += self.step;
        }
        if self.enabled {
            info!(
                "{}: {} of {} ({}%) done in {:.1}s",
                self.label,
                self.count,
                self.total,
                percent,
                self.start.elapsed().as_secs_f64()
            );
        }
        Some(percent)
    }
}
