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
use std::sync::Mutex;
use std::time::Duration;

use common::logutil::get_logger;
use model::Meter;
use model::Resolver;
use model::Sampler;
use model::SessionStore;
use netfs::CounterSource;
use netfs::Counters;


/// Interface counters that grow by a fixed step on every read
struct SteadySource {
    interfaces: Mutex<HashMap<String, VecDeque<Counters>>>,
    default: Option<String>,
}

impl SteadySource {
    /// `eth0` moves `step` bytes each way per window
    fn new(step: u64) -> Self {
        let readings = (0..200)
            .map(|i| Counters {
                rx_bytes: i * step,
                tx_bytes: i * step * 2,
            })
            .collect();
        Self {
            interfaces: Mutex::new(HashMap::from([("eth0".to_string(), readings)])),
            default: Some("eth0".to_string()),
        }
    }
}

impl CounterSource for SteadySource {
    fn name(&self) -> &'static str {
        "steady"
    }

    fn interface_exists(&self, interface: &str) -> bool {
        self.interfaces
            .lock()
            .expect("Fake source poisoned")
            .contains_key(interface)
    }

    fn default_interface(&self) -> Option<String> {
        self.default.clone()
    }

    fn read_counters(&self, interface: &str) -> netfs::Result<Counters> {
        self.interfaces
            .lock()
            .expect("Fake source poisoned")
            .get_mut(interface)
            .and_then(|readings| readings.pop_front())
            .ok_or_else(|| netfs::Error::InterfaceMissing(interface.to_string()))
    }
}

fn test_meter(step: u64) -> Arc<Meter> {
    let source = Arc::new(SteadySource::new(step));
    Arc::new(Meter::new(
        Resolver::new(source.clone(), vec![], get_logger()),
        Sampler::new(source, Duration::from_secs(1), get_logger()),
        SessionStore::new(30, Duration::from_secs(1440)),
        get_logger(),
    ))
}
