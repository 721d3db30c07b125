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


use std::collections::VecDeque;

use serde::Deserialize;
use serde::Serialize;

/// One rate measurement: `[timestamp_ms, kb_per_sec]` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample(pub i64, pub f64);

impl Sample {
    pub fn timestamp(&self) -> i64 {
        self.0
    }

    pub fn rate(&self) -> f64 {
        self.1
    }
}

/// Receive and transmit rates in KB/s from one measurement window
#[derive(Default, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub rx: f64,
    pub tx: f64,
}

/// Rolling window of the most recent rate samples.
///
/// Receive and transmit samples are pushed and evicted together, so the two
/// sequences always have the same length and line up index by index.
#[derive(Clone, Debug, PartialEq)]
pub struct History {
    rx: VecDeque<Sample>,
    tx: VecDeque<Sample>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rx: VecDeque::with_capacity(capacity),
            tx: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point stamped `timestamp`, dropping the oldest entries once
    /// the window is full.
    pub fn push(&mut self, timestamp: i64, point: RatePoint) {
        while self.rx.len() >= self.capacity {
            self.rx.pop_front();
            self.tx.pop_front();
        }
        self.rx.push_back(Sample(timestamp, point.rx));
        self.tx.push_back(Sample(timestamp, point.tx));
    }

    pub fn rx(&self) -> impl ExactSizeIterator<Item = &Sample> {
        self.rx.iter()
    }

    pub fn tx(&self) -> impl ExactSizeIterator<Item = &Sample> {
        self.tx.iter()
    }

    /// Most recent `(rx, tx)` pair
    pub fn latest(&self) -> Option<(Sample, Sample)> {
        Some((*self.rx.back()?, *self.tx.back()?))
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.rx.clear();
        self.tx.clear();
    }
}
