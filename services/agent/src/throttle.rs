use std::time::{Duration, Instant};

/// Minimum spacing between sends, enforced on the producer side.
///
/// Only successful sends are recorded, so a failed send can be retried on the
/// next frame that qualifies.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ready(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }

    /// Time left before the next send is allowed
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_sent {
            None => Duration::ZERO,
            Some(sent) => self
                .interval
                .saturating_sub(now.saturating_duration_since(sent)),
        }
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_send_is_allowed() {
        let throttle = Throttle::new(Duration::from_secs(10));
        assert!(throttle.ready(Instant::now()));
    }

    #[test]
    fn test_blocks_until_interval_elapses() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_secs(10));
        throttle.mark_sent(start);

        assert!(!throttle.ready(start + Duration::from_secs(3)));
        assert_eq!(
            throttle.remaining(start + Duration::from_secs(3)),
            Duration::from_secs(7)
        );
        assert!(throttle.ready(start + Duration::from_secs(10)));
        assert!(throttle.ready(start + Duration::from_secs(25)));
    }

    #[test]
    fn test_zero_interval_never_blocks() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::ZERO);
        throttle.mark_sent(start);
        assert!(throttle.ready(start));
    }
}
