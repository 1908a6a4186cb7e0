use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer has not been started")]
    NotStarted,
    #[error("timer has not been stopped")]
    NotStopped,
}

/// Manual stopwatch over a single start/stop interval.
///
/// Querying the elapsed duration before both endpoints have been recorded is
/// a usage error, reported as [`TimerError`] rather than being conflated with
/// I/O failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct Timer {
    start: Option<Instant>,
    stop: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a timer that is already running.
    pub fn started() -> Self {
        let mut timer = Self::new();
        timer.start();
        timer
    }

    /// Record the start of the interval, discarding any previous stop.
    pub fn start(&mut self) {
        self.start = Some(Instant::now());
        self.stop = None;
    }

    /// Record the end of the interval and return its duration.
    pub fn stop(&mut self) -> Result<Duration, TimerError> {
        if self.start.is_none() {
            return Err(TimerError::NotStarted);
        }
        self.stop = Some(Instant::now());
        self.elapsed()
    }

    /// Duration between the recorded start and stop.
    pub fn elapsed(&self) -> Result<Duration, TimerError> {
        let start = self.start.ok_or(TimerError::NotStarted)?;
        let stop = self.stop.ok_or(TimerError::NotStopped)?;
        Ok(stop.duration_since(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_requires_start_and_stop() {
        let timer = Timer::new();
        assert_eq!(timer.elapsed(), Err(TimerError::NotStarted));

        let timer = Timer::started();
        assert_eq!(timer.elapsed(), Err(TimerError::NotStopped));

        let mut timer = Timer::new();
        assert_eq!(timer.stop(), Err(TimerError::NotStarted));
    }

    #[test]
    fn test_stop_returns_elapsed() {
        let mut timer = Timer::started();
        let elapsed = timer.stop().expect("timer was started");
        assert_eq!(timer.elapsed(), Ok(elapsed));
    }

    #[test]
    fn test_restart_discards_stop() {
        let mut timer = Timer::started();
        timer.stop().expect("timer was started");
        timer.start();
        assert_eq!(timer.elapsed(), Err(TimerError::NotStopped));
    }
}
