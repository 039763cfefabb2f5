use std::time::Duration;

/// Exponential backoff with a 2x coefficient, capped at `max`. A pure
/// function so the retry/escalation decision in the orchestrator is
/// testable without sleeping.
pub fn delay_for_attempt(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let scaled = initial.saturating_mul(1u32 << attempt.min(16));
    scaled.min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_uses_the_initial_interval() {
        let delay = delay_for_attempt(0, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn later_attempts_double_each_time() {
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        assert_eq!(delay_for_attempt(1, initial, max), Duration::from_secs(2));
        assert_eq!(delay_for_attempt(2, initial, max), Duration::from_secs(4));
        assert_eq!(delay_for_attempt(3, initial, max), Duration::from_secs(8));
    }

    #[test]
    fn delay_is_capped_at_the_maximum_interval() {
        let delay = delay_for_attempt(10, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(delay, Duration::from_secs(30));
    }
}
