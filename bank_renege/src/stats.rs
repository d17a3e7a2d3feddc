use des::Time;

use crate::journal::{Journal, Label};

/// Queue statistics derived from a journal
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueueStats {
    pub arrivals: usize,
    pub served: usize,
    pub reneged: usize,
    pub finished: usize,
    /// Summed wait of customers who reached the counter
    pub wait_sum: Time,
    /// Summed wait of customers who gave up
    pub renege_wait_sum: Time,
}

impl QueueStats {
    pub fn from_journal(journal: &Journal) -> Self {
        let mut stats = QueueStats::default();
        for record in journal.records() {
            match record.label {
                Label::Arrived => stats.arrivals += 1,
                Label::Waited(wait) => {
                    stats.served += 1;
                    stats.wait_sum += wait;
                }
                Label::Reneged(wait) => {
                    stats.reneged += 1;
                    stats.renege_wait_sum += wait;
                }
                Label::Finished => stats.finished += 1,
            }
        }
        stats
    }

    /// Fold another run's statistics into this one
    pub fn merge(&mut self, other: &QueueStats) {
        self.arrivals += other.arrivals;
        self.served += other.served;
        self.reneged += other.reneged;
        self.finished += other.finished;
        self.wait_sum += other.wait_sum;
        self.renege_wait_sum += other.renege_wait_sum;
    }

    pub fn mean_wait(&self) -> Option<Time> {
        if self.served == 0 {
            return None;
        }
        Some(self.wait_sum / self.served as f64)
    }

    pub fn mean_renege_wait(&self) -> Option<Time> {
        if self.reneged == 0 {
            return None;
        }
        Some(self.renege_wait_sum / self.reneged as f64)
    }

    pub fn served_fraction(&self) -> Option<f64> {
        if self.arrivals == 0 {
            return None;
        }
        Some(self.served as f64 / self.arrivals as f64)
    }

    /// Every arrival ended as Finished or Reneged
    pub fn is_complete(&self) -> bool {
        self.finished + self.reneged == self.arrivals && self.served == self.finished
    }
}
