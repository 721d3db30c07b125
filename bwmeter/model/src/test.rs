// Copyright (c) Facebook, Inc. and its affiliates.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use common::logutil::get_logger;
use netfs::CounterSource;
use netfs::Counters;
use parking_lot::Mutex;

use crate::*;

/// Counter source scripted per interface. Each read pops the next reading;
/// the last one repeats.
#[derive(Default)]
struct FakeSource {
    default: Option<String>,
    readings: Mutex<HashMap<String, VecDeque<Counters>>>,
}

impl FakeSource {
    fn with_interface(self, interface: &str, readings: Vec<(u64, u64)>) -> Self {
        self.readings.lock().insert(
            interface.to_string(),
            readings
                .into_iter()
                .map(|(rx_bytes, tx_bytes)| Counters { rx_bytes, tx_bytes })
                .collect(),
        );
        self
    }

    fn with_default(mut self, interface: &str) -> Self {
        self.default = Some(interface.to_string());
        self
    }

    fn remove_interface(&self, interface: &str) {
        self.readings.lock().remove(interface);
    }
}

impl CounterSource for FakeSource {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn interface_exists(&self, interface: &str) -> bool {
        self.readings.lock().contains_key(interface)
    }

    fn default_interface(&self) -> Option<String> {
        self.default.clone()
    }

    fn read_counters(&self, interface: &str) -> netfs::Result<Counters> {
        let mut readings = self.readings.lock();
        let queue = readings
            .get_mut(interface)
            .ok_or_else(|| netfs::Error::InterfaceMissing(interface.to_string()))?;
        match queue.len() {
            0 => Err(netfs::Error::InterfaceMissing(interface.to_string())),
            1 => Ok(queue[0]),
            _ => Ok(queue.pop_front().unwrap_or_default()),
        }
    }
}

fn resolver_for(source: FakeSource, common: &[&str]) -> Resolver {
    Resolver::new(
        Arc::new(source),
        common.iter().map(|s| s.to_string()).collect(),
        get_logger(),
    )
}

fn meter_for(source: Arc<FakeSource>) -> Meter {
    Meter::new(
        Resolver::new(source.clone(), vec!["eth0".to_string()], get_logger()),
        Sampler::new(source, Duration::from_secs(1), get_logger()),
        SessionStore::new(30, Duration::from_secs(1440)),
        get_logger(),
    )
}

/// Readings so that poll `k` (1-based) measures k KB/s received and 2k KB/s
/// sent.
fn ramp_readings(polls: u64) -> Vec<(u64, u64)> {
    let mut readings = Vec::new();
    let (mut rx, mut tx) = (10_000, 20_000);
    for k in 1..=polls {
        readings.push((rx, tx));
        rx += k * 1024;
        tx += 2 * k * 1024;
        readings.push((rx, tx));
    }
    readings
}

#[test]
fn test_history_fifo() {
    let mut history = History::new(30);
    assert!(history.is_empty());
    for i in 1..=31 {
        history.push(i * 1000, RatePoint {
            rx: i as f64,
            tx: -(i as f64),
        });
        assert_eq!(history.len(), std::cmp::min(i as usize, 30));
        assert_eq!(history.rx().len(), history.tx().len());
    }
    let rx: Vec<Sample> = history.rx().copied().collect();
    assert_eq!(rx.first(), Some(&Sample(2000, 2.0)));
    assert_eq!(rx.last(), Some(&Sample(31_000, 31.0)));
    assert!(rx.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));
    assert_eq!(
        history.latest(),
        Some((Sample(31_000, 31.0), Sample(31_000, -31.0)))
    );

    history.clear();
    assert!(history.is_empty());
    assert_eq!(history.latest(), None);
}

#[test]
fn test_history_zero_capacity() {
    let mut history = History::new(0);
    history.push(1, RatePoint::default());
    history.push(2, RatePoint::default());
    assert_eq!(history.capacity(), 1);
    assert_eq!(history.len(), 1);
}

#[test]
fn test_kb_per_sec() {
    assert_eq!(kb_per_sec(1000, 2000, Duration::from_secs(1)), Some(0.98));
    assert_eq!(kb_per_sec(0, 0, Duration::from_secs(1)), Some(0.0));
    assert_eq!(kb_per_sec(0, 2048, Duration::from_secs(2)), Some(1.0));
    assert_eq!(kb_per_sec(5000, 10, Duration::from_secs(1)), None);
    assert_eq!(kb_per_sec(0, 10, Duration::ZERO), None);
}

#[test]
fn test_interface_name_validation() {
    assert!(is_valid_interface_name("eth0"));
    assert!(is_valid_interface_name("enp0s31f6"));
    assert!(is_valid_interface_name("br-1a2b3c4d5e6f"));
    assert!(!is_valid_interface_name(""));
    assert!(!is_valid_interface_name("."));
    assert!(!is_valid_interface_name(".."));
    assert!(!is_valid_interface_name("../../etc"));
    assert!(!is_valid_interface_name("eth0 up"));
    assert!(!is_valid_interface_name("averyveryverylongname"));
}

#[test]
fn test_resolve_requested() {
    let resolver = resolver_for(
        FakeSource::default()
            .with_interface("eth0", vec![(0, 0)])
            .with_interface("wlan0", vec![(0, 0)]),
        &[],
    );
    for iface in ["eth0", "wlan0"] {
        assert_eq!(resolver.resolve(Some(iface)).expect("valid interface"), iface);
    }
    assert_eq!(
        resolver.resolve(Some("  wlan0 ")).expect("trimmed interface"),
        "wlan0"
    );

    match resolver.resolve(Some("doesnotexist123")) {
        Err(SampleError::InterfaceNotFound(name)) => assert_eq!(name, "doesnotexist123"),
        res => panic!("Unexpected result: {:?}", res),
    }
}

#[test]
fn test_resolve_rejects_bad_names() {
    // Even a source that would claim these exist is never asked
    let resolver = resolver_for(
        FakeSource::default().with_interface("../lo", vec![(0, 0)]),
        &[],
    );
    match resolver.resolve(Some("../lo")) {
        Err(SampleError::InterfaceNotFound(name)) => assert_eq!(name, "../lo"),
        res => panic!("Unexpected result: {:?}", res),
    }
}

#[test]
fn test_resolve_default_route() {
    let resolver = resolver_for(
        FakeSource::default()
            .with_interface("eth0", vec![(0, 0)])
            .with_interface("wlan0", vec![(0, 0)])
            .with_default("eth0"),
        &["wlan0"],
    );
    assert_eq!(resolver.resolve(None).expect("default route"), "eth0");
    assert_eq!(resolver.resolve(Some("")).expect("default route"), "eth0");
}

#[test]
fn test_resolve_blank_request() {
    // Whitespace is still a request, and it names no interface
    let resolver = resolver_for(
        FakeSource::default()
            .with_interface("eth0", vec![(0, 0)])
            .with_default("eth0"),
        &["eth0"],
    );
    match resolver.resolve(Some("   ")) {
        Err(SampleError::InterfaceNotFound(name)) => assert_eq!(name, ""),
        res => panic!("Unexpected result: {:?}", res),
    }
    assert_eq!(resolver.resolve(Some(" eth0\t")).expect("trimmed"), "eth0");
}

#[test]
fn test_resolve_common_fallback() {
    // Default route names an interface that does not validate
    let resolver = resolver_for(
        FakeSource::default()
            .with_interface("wlan0", vec![(0, 0)])
            .with_interface("em0", vec![(0, 0)])
            .with_default("tun7"),
        &["eth0", "en0", "ens33", "wlan0", "em0"],
    );
    assert_eq!(resolver.resolve(None).expect("common fallback"), "wlan0");

    let resolver = resolver_for(
        FakeSource::default().with_interface("em0", vec![(0, 0)]),
        &["eth0", "en0", "ens33", "wlan0", "em0"],
    );
    assert_eq!(resolver.resolve(None).expect("common fallback"), "em0");
}

#[test]
fn test_resolve_nothing_detected() {
    let resolver = resolver_for(
        FakeSource::default().with_interface("lo", vec![(0, 0)]),
        &["eth0", "en0"],
    );
    match resolver.resolve(None) {
        Err(SampleError::NoInterfaceDetected) => {}
        res => panic!("Unexpected result: {:?}", res),
    }
}

#[tokio::test(start_paused = true)]
async fn test_sample_rate() {
    let source = Arc::new(FakeSource::default().with_interface("eth0", vec![
        (1000, 500),
        (2000, 500),
    ]));
    let sampler = Sampler::new(source, Duration::from_secs(1), get_logger());

    let start = tokio::time::Instant::now();
    let point = sampler.sample("eth0").await.expect("Fail to sample");
    assert_eq!(point, RatePoint { rx: 0.98, tx: 0.0 });
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_sample_counter_wrap() {
    let source = Arc::new(FakeSource::default().with_interface("eth0", vec![
        (u64::MAX - 10, 4096),
        (100, 6144),
    ]));
    let sampler = Sampler::new(source, Duration::from_secs(1), get_logger());
    let point = sampler.sample("eth0").await.expect("Fail to sample");
    assert_eq!(point, RatePoint { rx: 0.0, tx: 2.0 });
}

#[tokio::test(start_paused = true)]
async fn test_sample_interface_vanished() {
    let source = Arc::new(FakeSource::default());
    let sampler = Sampler::new(source, Duration::from_secs(1), get_logger());
    match sampler.sample("eth0").await {
        Err(SampleError::CounterReadError { interface, source }) => {
            assert_eq!(interface, "eth0");
            assert!(matches!(source, netfs::Error::InterfaceMissing(_)));
        }
        res => panic!("Unexpected result: {:?}", res),
    }
}

#[test]
fn test_session_lifecycle() {
    let store = SessionStore::new(30, Duration::from_secs(60));
    assert!(store.is_empty());

    let id = store.touch_or_create(None);
    assert_eq!(store.len(), 1);
    assert_eq!(store.touch_or_create(Some(id.as_str())), id);
    assert_eq!(store.len(), 1);

    // Unknown ids are replaced, not adopted
    let other = store.touch_or_create(Some("made-up-by-the-client"));
    assert_ne!(other.as_str(), "made-up-by-the-client");
    assert_eq!(store.len(), 2);

    store.record(&id, RatePoint { rx: 1.0, tx: 2.0 });
    assert_eq!(store.history(&id).map(|h| h.len()), Some(1));
    assert_eq!(store.history(&other).map(|h| h.len()), Some(0));

    let fresh = store.reset(Some(id.as_str()));
    assert_ne!(fresh, id);
    assert_eq!(store.history(&id), None);
    assert_eq!(store.history(&fresh).map(|h| h.len()), Some(0));
    assert_eq!(store.len(), 2);
}

#[test]
fn test_session_expiry() {
    let store = SessionStore::new(30, Duration::from_secs(60));
    let id = store.touch_or_create(None);
    assert_eq!(store.sweep_expired_at(Instant::now()), 0);
    assert_eq!(
        store.sweep_expired_at(Instant::now() + Duration::from_secs(61)),
        1
    );
    assert_eq!(store.history(&id), None);

    // Recording into an expired session brings it back
    let history = store.record(&id, RatePoint::default());
    assert_eq!(history.len(), 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_session_window() {
    let store = SessionStore::new(30, Duration::from_secs(60));
    let id = store.touch_or_create(None);
    let history = (1..=45)
        .map(|i| {
            store.record(&id, RatePoint {
                rx: i as f64,
                tx: i as f64,
            })
        })
        .last()
        .expect("No history recorded");
    assert_eq!(history.len(), 30);
    assert_eq!(history.rx().next().map(|s| s.rate()), Some(16.0));
    assert!(
        history
            .rx()
            .collect::<Vec<_>>()
            .windows(2)
            .all(|w| w[0].timestamp() <= w[1].timestamp())
    );
}

#[test]
fn test_session_concurrent_records() {
    let store = SessionStore::new(30, Duration::from_secs(60));
    let id = store.touch_or_create(None);
    let writers = 4;
    let per_writer = 25;

    std::thread::scope(|s| {
        for writer in 0..writers {
            let store = &store;
            let id = &id;
            s.spawn(move || {
                for i in 0..per_writer {
                    let rate = (writer * 1000 + i) as f64;
                    store.record(id, RatePoint { rx: rate, tx: rate });
                }
            });
        }
    });

    let history = store.history(&id).expect("Session was dropped");
    assert_eq!(history.len(), std::cmp::min(writers * per_writer, 30));
    let rx = history.rx().collect::<Vec<_>>();
    let tx = history.tx().collect::<Vec<_>>();
    assert_eq!(rx.len(), tx.len());
    // Each rx entry is paired with the tx entry of the same record
    for (rx, tx) in rx.iter().zip(tx.iter()) {
        assert_eq!(rx.timestamp(), tx.timestamp());
        assert_eq!(rx.rate(), tx.rate());
    }
    assert!(rx.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
}

#[test]
fn test_response_shape() {
    let mut history = History::new(30);
    history.push(1_700_000_000_000, RatePoint { rx: 1.5, tx: 0.25 });
    history.push(1_700_000_001_000, RatePoint { rx: 2.5, tx: 0.5 });
    let response = Response::success("eth0".to_string(), &history);
    assert!(response.is_success());

    let value = serde_json::to_value(&response).expect("Fail to serialize");
    assert_eq!(
        value,
        serde_json::json!({
            "label": "eth0",
            "data": [[1_700_000_000_000_i64, 1.5], [1_700_000_001_000_i64, 2.5]],
            "tx_data": [[1_700_000_000_000_i64, 0.25], [1_700_000_001_000_i64, 0.5]],
            "timestamp": 1_700_000_001_000_i64,
            "current": {"rx": 2.5, "tx": 0.5},
            "status": "success",
        })
    );
}

#[test]
fn test_error_response_shape() {
    let response = Response::error(&SampleError::InterfaceNotFound("doesnotexist123".into()));
    assert!(!response.is_success());
    assert_eq!(
        response.to_json().expect("Fail to serialize"),
        r#"{"error":"Requested interface 'doesnotexist123' not found or not active","status":"error"}"#
    );
    assert_eq!(
        SampleError::NoInterfaceDetected.to_string(),
        "Could not detect default network interface"
    );
}

#[tokio::test(start_paused = true)]
async fn test_meter_rolling_window() {
    let source = Arc::new(FakeSource::default().with_interface("eth0", ramp_readings(31)));
    let meter = meter_for(source);
    let session = meter.sessions().touch_or_create(None);

    let mut last = None;
    for poll in 1..=31 {
        let response = meter.poll(&session, Some("eth0".to_string())).await;
        match &response {
            Response::Success(body) => {
                assert_eq!(body.data.len(), std::cmp::min(poll, 30));
                assert_eq!(body.data.len(), body.tx_data.len());
                assert_eq!(body.current.rx, poll as f64);
                assert_eq!(body.current.tx, 2.0 * poll as f64);
            }
            Response::Error(e) => panic!("Poll {} failed: {}", poll, e.error),
        }
        last = Some(response);
    }

    match last {
        Some(Response::Success(body)) => {
            assert_eq!(body.label, "eth0");
            assert_eq!(body.data.len(), 30);
            // Poll #1 was evicted
            assert_eq!(body.data[0].rate(), 2.0);
            assert_eq!(body.data[29].rate(), 31.0);
            assert_eq!(body.timestamp, body.data[29].timestamp());
        }
        _ => panic!("No final response"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_meter_default_interface() {
    let source = Arc::new(
        FakeSource::default()
            .with_interface("eth0", vec![(0, 0), (1024, 2048)])
            .with_default("eth0"),
    );
    let meter = meter_for(source);
    let session = meter.sessions().touch_or_create(None);
    match meter.poll(&session, None).await {
        Response::Success(body) => {
            assert_eq!(body.label, "eth0");
            assert_eq!(body.current, Current { rx: 1.0, tx: 2.0 });
        }
        Response::Error(e) => panic!("Poll failed: {}", e.error),
    }
}

#[tokio::test(start_paused = true)]
async fn test_meter_errors_leave_history_alone() {
    let source = Arc::new(FakeSource::default().with_interface("eth0", vec![(0, 0), (1024, 0)]));
    let meter = meter_for(source.clone());
    let session = meter.sessions().touch_or_create(None);
    assert!(meter.poll(&session, None).await.is_success());

    let response = meter
        .poll(&session, Some("doesnotexist123".to_string()))
        .await;
    assert_eq!(
        response,
        Response::Error(ErrorBody {
            error: "Requested interface 'doesnotexist123' not found or not active".to_string(),
            status: STATUS_ERROR,
        })
    );

    source.remove_interface("eth0");
    match meter.poll(&session, None).await {
        Response::Error(e) => assert_eq!(e.error, "Could not detect default network interface"),
        Response::Success(_) => panic!("Poll should fail without interfaces"),
    }
    assert_eq!(meter.sessions().history(&session).map(|h| h.len()), Some(1));
}

#[tokio::test]
async fn test_join_outcome() {
    assert_eq!(join_outcome(Ok(7)).expect("Task finished"), 7);

    let task = tokio::spawn(std::future::pending::<u64>());
    task.abort();
    let cancelled = task.await.expect_err("Task was aborted");
    assert!(cancelled.is_cancelled());
    match join_outcome::<u64>(Err(cancelled)) {
        Err(SampleError::Cancelled) => {}
        res => panic!("Unexpected result: {:?}", res),
    }
}

#[tokio::test]
#[should_panic(expected = "counter read blew up")]
async fn test_run_blocking_resumes_panic() {
    let _ = run_blocking(|| -> u64 { panic!("counter read blew up") }).await;
}
