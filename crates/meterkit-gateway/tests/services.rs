//! Demo workload instruments.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use meterkit_core::{ManualReader, MeterProvider};
use meterkit_gateway::services::{GcObserver, RequestWork};

#[tokio::test(start_paused = true)]
async fn request_work_takes_under_ten_millis() {
    let reader = ManualReader::new();
    let provider = MeterProvider::builder().with_reader(reader.clone()).build().unwrap();
    let meter = provider.meter("demo");
    let work = RequestWork::new(
        meter.counter::<i64>("request.count").build().unwrap(),
        meter.histogram::<i64>("request.duration").build().unwrap(),
    );

    for _ in 0..50 {
        assert!(work.handle().await < Duration::from_millis(10));
    }

    let rm = reader.collect().unwrap().metrics;
    assert_eq!(rm.metric("request.count").unwrap().data.points()[0].value.as_f64(), 50.0);
    let hist = &rm.metric("request.duration").unwrap().data.histogram_points()[0];
    assert_eq!(hist.count, 50);
    assert!(hist.max.unwrap().as_f64() < 10.0);
}

#[test]
fn gc_observer_grows_by_small_steps() {
    let reader = ManualReader::new();
    let provider = MeterProvider::builder().with_reader(reader.clone()).build().unwrap();
    let meter = provider.meter("demo");
    let counter = meter.observable_counter::<i64>("runtime.gc.count").build().unwrap();
    meter
        .register_callback(GcObserver::new(counter.clone()), &[&counter])
        .unwrap();

    let mut last = 0.0;
    for _ in 0..100 {
        let rm = reader.collect().unwrap().metrics;
        let now = rm.metric("runtime.gc.count").unwrap().data.points()[0].value.as_f64();
        let step = now - last;
        assert!((0.0..4.0).contains(&step), "step {step}");
        last = now;
    }
}
