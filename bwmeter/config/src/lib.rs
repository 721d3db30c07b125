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


#![deny(clippy::all)]

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use anyhow::bail;
use netfs::PlatformKind;
use netfs::SourcePaths;
use serde::Deserialize;
use serde::Serialize;


pub const BWMETER_DEFAULT_CONF: &str = "/etc/bwmeter/bwmeter.conf";
pub const DEFAULT_HISTORY_LEN: usize = 30;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1440;

/// Global bwmeter config
pub static BWMETER_CONFIG: OnceLock<BwmeterConfig> = OnceLock::new();

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
// If value is missing during deserialization, use the Default::default()
#[serde(default)]
pub struct BwmeterConfig {
    pub listen_addr: SocketAddr,
    /// Also log to `<log_dir>/bwmeter.log` when set
    pub log_dir: Option<PathBuf>,
    pub platform: PlatformKind,
    pub sysfs_net: PathBuf,
    pub procfs_net: PathBuf,
    pub netstat_path: PathBuf,
    /// Probed in order when the default route gives no answer
    pub common_interfaces: Vec<String>,
    pub history_len: usize,
    pub sample_interval_ms: u64,
    pub session_ttl_secs: u64,
}

impl Default for BwmeterConfig {
    fn default() -> Self {
        let paths = SourcePaths::default();
        BwmeterConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_dir: None,
            platform: PlatformKind::Auto,
            sysfs_net: paths.sysfs_net,
            procfs_net: paths.procfs_net,
            netstat_path: paths.netstat,
            common_interfaces: ["eth0", "en0", "ens33", "wlan0", "em0"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            history_len: DEFAULT_HISTORY_LEN,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl BwmeterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config = match path.exists() {
            true if !path.is_file() => bail!("{} exists and is not a file", path.to_string_lossy()),
            true => BwmeterConfig::load_exists(path)?,
            false if path.to_string_lossy() == BWMETER_DEFAULT_CONF => Default::default(),
            false => bail!("No such file or directory: {}", path.to_string_lossy()),
        };
        config.validate()?;
        Ok(config)
    }

    fn load_exists(path: &Path) -> Result<Self> {
        let string_config = match fs::read_to_string(path) {
            Ok(sc) => sc,
            Err(e) => {
                bail!(
                    "Failed to read from config file {}: {}",
                    path.to_string_lossy(),
                    e
                );
            }
        };

        match toml::from_str(string_config.as_str()) {
            Ok(bc) => Ok(bc),
            Err(e) => {
                bail!(
                    "Failed to parse config file {}: {}\n{}",
                    path.to_string_lossy(),
                    e,
                    string_config
                );
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.history_len == 0 {
            bail!("history_len must be at least 1");
        }
        if self.sample_interval_ms == 0 {
            bail!("sample_interval_ms must be at least 1");
        }
        Ok(())
    }

    pub fn source_paths(&self) -> SourcePaths {
        SourcePaths {
            sysfs_net: self.sysfs_net.clone(),
            procfs_net: self.procfs_net.clone(),
            netstat: self.netstat_path.clone(),
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_dir.as_ref().map(|dir| dir.join("bwmeter.log"))
    }
}
