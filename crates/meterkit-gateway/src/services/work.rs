use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use meterkit_core::{Counter, Histogram};

/// Simulated request handler instrumented with a counter and a latency
/// histogram (milliseconds).
#[derive(Clone, Debug)]
pub struct RequestWork {
    count: Counter<i64>,
    duration: Histogram<i64>,
}

impl RequestWork {
    pub fn new(count: Counter<i64>, duration: Histogram<i64>) -> Self {
        Self { count, duration }
    }

    /// Count the request, sleep 0..10 ms, record how long it took.
    pub async fn handle(&self) -> Duration {
        self.count.add(1, &[]);
        let started = Instant::now();

        let n = rand::rng().random_range(0..10u64);
        tracing::debug!(ms = n, "working on task");
        tokio::time::sleep(Duration::from_millis(n)).await;

        let took = started.elapsed();
        self.duration
            .record(i64::try_from(took.as_millis()).unwrap_or(i64::MAX), &[]);
        took
    }
}
