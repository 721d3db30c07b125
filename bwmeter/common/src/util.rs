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


use chrono::prelude::*;

/// Wall-clock milliseconds since the unix epoch
pub fn get_unix_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Round `val` to `places` decimal places, halves away from zero.
pub fn round_to(val: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (val * factor).round() / factor
}

/// Convert `val` bytes into a human friendly string
pub fn convert_bytes(val: f64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    if val < 1_f64 {
        return format!("{:.1} {}", val, UNITS[0]);
    }
    let exponent = std::cmp::min(
        (val.ln() / 1024_f64.ln()).floor() as i32,
        (UNITS.len() - 1) as i32,
    );
    let pretty_val = round_to(val / 1024_f64.powi(exponent), 1);
    format!("{} {}", pretty_val, UNITS[exponent as usize])
}
