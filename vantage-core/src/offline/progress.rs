use std::time::Duration;

use tokio::time::Instant;

/// Rate limiter for progress notifications.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// Whether a report is due now; records the send when it is.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last_sent {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn at_most_one_report_per_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(100));
        assert!(throttle.ready());
        assert!(!throttle.ready());

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(!throttle.ready());

        tokio::time::advance(Duration::from_millis(40)).await;
        assert!(throttle.ready());
    }
}
