use std::time::{Duration, Instant};

/// Fixed-period sampling timer, polled by the host loop.
///
/// The first tick is due one period after the first poll following `start`.
/// Ticks missed by a slow host are skipped, not replayed.
#[derive(Debug, Clone)]
pub struct SampleTimer {
    period: Duration,
    active: bool,
    next_due: Option<Instant>,
    starts: u32,
    stops: u32,
}

impl SampleTimer {
    /// A stopped timer.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            active: false,
            next_due: None,
            starts: 0,
            stops: 0,
        }
    }

    /// Returns false if the timer was already running.
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.next_due = None;
        self.starts += 1;
        true
    }

    /// Returns false if the timer was not running.
    pub fn stop(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.next_due = None;
        self.stops += 1;
        true
    }

    /// True between `start` and `stop`.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// True if a tick is due at `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.active {
            return false;
        }
        match self.next_due {
            None => {
                self.next_due = Some(now + self.period);
                false
            }
            Some(due) if now >= due => {
                let next = due + self.period;
                self.next_due = Some(if next <= now { now + self.period } else { next });
                true
            }
            Some(_) => false,
        }
    }

    /// Times the timer went from stopped to running.
    pub fn starts(&self) -> u32 {
        self.starts
    }

    /// Times the timer went from running to stopped.
    pub fn stops(&self) -> u32 {
        self.stops
    }
}
