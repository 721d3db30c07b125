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


use std::sync::Arc;
use std::time::Duration;

use common::util::convert_bytes;
use common::util::round_to;
use netfs::CounterSource;
use netfs::Counters;
use slog::debug;
use slog::warn;

use crate::RatePoint;
use crate::SampleError;
use crate::run_blocking;

/// KB/s over `window` between two readings of a monotonic counter. `None`
/// when the counter went backwards (reset or wrap).
pub fn kb_per_sec(before: u64, after: u64, window: Duration) -> Option<f64> {
    if before > after || window.is_zero() {
        return None;
    }
    Some(round_to(
        (after - before) as f64 / window.as_secs_f64() / 1024.0,
        2,
    ))
}

/// Measures throughput by reading counters twice, one window apart.
///
/// The wait between the readings is a timer, not a blocking sleep, and the
/// readings themselves run on the blocking pool, so a measurement in flight
/// never holds up other requests.
pub struct Sampler {
    source: Arc<dyn CounterSource>,
    window: Duration,
    logger: slog::Logger,
}

impl Sampler {
    pub fn new(source: Arc<dyn CounterSource>, window: Duration, logger: slog::Logger) -> Self {
        Self {
            source,
            window,
            logger,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    async fn read_counters(&self, interface: &str) -> Result<Counters, SampleError> {
        let source = self.source.clone();
        let iface = interface.to_string();
        run_blocking(move || source.read_counters(&iface))
            .await?
            .map_err(|source| SampleError::CounterReadError {
                interface: interface.to_string(),
                source,
            })
    }

    pub async fn sample(&self, interface: &str) -> Result<RatePoint, SampleError> {
        let first = self.read_counters(interface).await?;
        tokio::time::sleep(self.window).await;
        let second = self.read_counters(interface).await?;
        Ok(self.compute(interface, &first, &second))
    }

    fn compute(&self, interface: &str, first: &Counters, second: &Counters) -> RatePoint {
        let rate = |direction: &str, before: u64, after: u64| {
            kb_per_sec(before, after, self.window).unwrap_or_else(|| {
                warn!(
                    self.logger,
                    "{} {} counter went backwards ({} -> {}), reporting 0",
                    interface,
                    direction,
                    before,
                    after
                );
                0.0
            })
        };
        let point = RatePoint {
            rx: rate("rx", first.rx_bytes, second.rx_bytes),
            tx: rate("tx", first.tx_bytes, second.tx_bytes),
        };
        debug!(
            self.logger,
            "{}: rx {}/s tx {}/s",
            interface,
            convert_bytes(point.rx * 1024.0),
            convert_bytes(point.tx * 1024.0)
        );
        point
    }
}
