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


use serde::Deserialize;
use serde::Serialize;

/// Cumulative byte counters of one interface at one instant
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Counters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Which family of counter source to use.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Pick from the OS we were built for
    #[default]
    Auto,
    /// sysfs + procfs
    Linux,
    /// netstat + route, for FreeBSD, macOS and friends
    Bsd,
}

impl PlatformKind {
    /// Map an OS family name, as in `std::env::consts::OS`, to a platform.
    pub fn from_os_name(os: &str) -> Option<PlatformKind> {
        match os {
            "linux" => Some(PlatformKind::Linux),
            "freebsd" | "macos" | "openbsd" | "netbsd" | "dragonfly" => Some(PlatformKind::Bsd),
            _ => None,
        }
    }
}
