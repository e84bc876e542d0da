//! Backoff schedule driven by synthetic elapsed time.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use meterkit_core::BackoffPolicy;

#[test]
fn default_schedule_grows_until_deadline() {
    let mut backoff = BackoffPolicy::default().start();
    let mut elapsed = Duration::ZERO;
    let mut delays = Vec::new();
    while let Some(d) = backoff.next_delay(elapsed) {
        delays.push(d);
        elapsed += d;
    }

    assert_eq!(
        delays,
        vec![
            Duration::from_secs(5),
            Duration::from_millis(7500),
            Duration::from_millis(11250),
            Duration::from_micros(16_875_000),
        ]
    );
    assert!(elapsed <= Duration::from_secs(60));
}

#[test]
fn interval_is_capped() {
    let policy = BackoffPolicy {
        initial_interval: Duration::from_secs(1),
        multiplier: 10.0,
        max_interval: Duration::from_secs(3),
        max_elapsed_time: Duration::from_secs(100),
    };
    let mut backoff = policy.start();
    assert_eq!(backoff.next_delay(Duration::ZERO), Some(Duration::from_secs(1)));
    assert_eq!(backoff.next_delay(Duration::from_secs(1)), Some(Duration::from_secs(3)));
    assert_eq!(backoff.next_delay(Duration::from_secs(4)), Some(Duration::from_secs(3)));
}

#[test]
fn exhausted_budget_gives_up() {
    let mut backoff = BackoffPolicy::default().start();
    assert_eq!(backoff.next_delay(Duration::from_secs(56)), None);
}
