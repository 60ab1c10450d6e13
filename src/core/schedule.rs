use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub const FIRST_CHECK: Duration = Duration::from_secs(5);
pub const SECOND_CHECK: Duration = Duration::from_secs(10);
pub const RAPID_INTERVAL: Duration = Duration::from_secs(1);
pub const TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("first check must be after session start")]
    ZeroFirstCheck,
    #[error("second check ({second:?}) must come after the first ({first:?})")]
    SecondBeforeFirst { first: Duration, second: Duration },
    #[error("rapid interval must be non-zero")]
    ZeroRapidInterval,
    #[error("timeout ({timeout:?}) must come after the second check ({second:?})")]
    TimeoutBeforeSecond { second: Duration, timeout: Duration },
}

/// Three-phase check schedule, measured from session start: a slow first
/// check, a second check, then rapid checks until a hard ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    first_check: Duration,
    second_check: Duration,
    rapid_interval: Duration,
    timeout: Duration,
}

impl PollSchedule {
    pub fn new(
        first_check: Duration,
        second_check: Duration,
        rapid_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, ScheduleError> {
        let schedule = Self {
            first_check,
            second_check,
            rapid_interval,
            timeout,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    fn validate(&self) -> Result<(), ScheduleError> {
        if self.first_check.is_zero() {
            return Err(ScheduleError::ZeroFirstCheck);
        }
        if self.second_check <= self.first_check {
            return Err(ScheduleError::SecondBeforeFirst {
                first: self.first_check,
                second: self.second_check,
            });
        }
        if self.rapid_interval.is_zero() {
            return Err(ScheduleError::ZeroRapidInterval);
        }
        if self.timeout <= self.second_check {
            return Err(ScheduleError::TimeoutBeforeSecond {
                second: self.second_check,
                timeout: self.timeout,
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Delay before the next check, given how many checks have completed.
    pub fn delay_after(&self, checks: u32) -> Duration {
        match checks {
            0 => self.first_check,
            1 => self.second_check - self.first_check,
            _ => self.rapid_interval,
        }
    }

    pub fn deadline(&self, started: Instant) -> Instant {
        started + self.timeout
    }

    /// Next wake-up instant. Never later than the ceiling, so the cutoff
    /// fires on time even when a fetch settles close to it.
    pub fn next_wake(&self, started: Instant, now: Instant, checks: u32) -> Instant {
        (now + self.delay_after(checks)).min(self.deadline(started))
    }

    pub fn is_expired(&self, started: Instant, now: Instant) -> bool {
        now.saturating_duration_since(started) >= self.timeout
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            first_check: FIRST_CHECK,
            second_check: SECOND_CHECK,
            rapid_interval: RAPID_INTERVAL,
            timeout: TIMEOUT,
        }
    }
}
