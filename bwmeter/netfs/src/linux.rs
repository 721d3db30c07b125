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


use std::io::BufRead;
use std::io::BufReader;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use openat::Dir;
use openat::SimpleType;

use crate::Counters;
use crate::CounterSource;
use crate::Error;
use crate::Result;
use crate::run_command;

/// Destination column value of the default route in /proc/net/route
const DEFAULT_ROUTE_DEST: &str = "00000000";

/// Reads interface counters from sysfs and the default route from procfs.
pub struct LinuxNetReader {
    interface_dir: Dir,
    interface_path: PathBuf,
    route_path: PathBuf,
}

impl LinuxNetReader {
    pub fn new() -> Result<LinuxNetReader> {
        Self::new_with_custom_path(crate::NET_SYSFS.into(), crate::NET_PROCFS.into())
    }

    pub fn new_with_custom_path(
        interface_path: PathBuf,
        proc_net_path: PathBuf,
    ) -> Result<LinuxNetReader> {
        let interface_dir =
            Dir::open(&interface_path).map_err(|e| Error::IoError(interface_path.clone(), e))?;

        Ok(LinuxNetReader {
            interface_dir,
            interface_path,
            route_path: proc_net_path.join("route"),
        })
    }

    fn read_iface_stat(stats_dir: &Dir, cur_path: &Path, stat_item: &str) -> Result<u64> {
        let file = stats_dir
            .open_file(stat_item)
            .map_err(|e| Error::IoError(cur_path.join(stat_item), e))?;
        let buf_reader = BufReader::new(file);
        match buf_reader.lines().next() {
            Some(line) => {
                let line = line.map_err(|e| Error::IoError(cur_path.join(stat_item), e))?;
                line.trim()
                    .parse::<u64>()
                    .map_err(move |_| Error::UnexpectedLine(cur_path.join(stat_item), line))
            }
            None => Err(Error::InvalidFileFormat(cur_path.join(stat_item))),
        }
    }

    /// Open `<iface>/statistics`. Entries under /sys/class/net are symlinks
    /// into /sys/devices and `Dir::sub_dir` does not follow them.
    fn stats_dir(&self, interface: &str) -> Result<Dir> {
        let cur_path = self.interface_path.join(interface);
        let metadata = self.interface_dir.metadata(interface).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::InterfaceMissing(interface.to_string())
            } else {
                Error::IoError(cur_path.clone(), e)
            }
        })?;
        let iface_dir = match metadata.simple_type() {
            SimpleType::Symlink => {
                let target = self
                    .interface_dir
                    .read_link(interface)
                    .map_err(|e| Error::IoError(cur_path.clone(), e))?;
                self.interface_dir
                    .sub_dir(target.as_path())
                    .map_err(|e| Error::IoError(target, e))?
            }
            _ => self
                .interface_dir
                .sub_dir(interface)
                .map_err(|e| Error::IoError(cur_path.clone(), e))?,
        };
        iface_dir
            .sub_dir("statistics")
            .map_err(|e| Error::IoError(cur_path.join("statistics"), e))
    }

    /// Default route interface from /proc/net/route
    pub fn read_route_table(&self) -> Result<Option<String>> {
        let content = std::fs::read_to_string(&self.route_path)
            .map_err(|e| Error::IoError(self.route_path.clone(), e))?;
        Ok(parse_route_table(&content))
    }
}

impl CounterSource for LinuxNetReader {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn interface_exists(&self, interface: &str) -> bool {
        self.interface_dir.metadata(interface).is_ok()
    }

    fn default_interface(&self) -> Option<String> {
        if let Ok(Some(iface)) = self.read_route_table() {
            return Some(iface);
        }
        run_command(Path::new("ip"), &["route", "show", "default"])
            .ok()
            .and_then(|out| parse_ip_route(&out))
    }

    fn read_counters(&self, interface: &str) -> Result<Counters> {
        let stats_dir = self.stats_dir(interface)?;
        let cur_path = self.interface_path.join(interface).join("statistics");
        Ok(Counters {
            rx_bytes: Self::read_iface_stat(&stats_dir, &cur_path, "rx_bytes")?,
            tx_bytes: Self::read_iface_stat(&stats_dir, &cur_path, "tx_bytes")?,
        })
    }
}

/// Find the interface of the default route in /proc/net/route content.
///
/// Format is like "eth0\t00000000\t0102A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0"
/// after a header line. The first row with a zero destination wins.
pub fn parse_route_table(content: &str) -> Option<String> {
    content.lines().skip(1).find_map(|line| {
        let mut items = line.split_whitespace();
        match (items.next(), items.next()) {
            (Some(iface), Some(DEFAULT_ROUTE_DEST)) => Some(iface.to_string()),
            _ => None,
        }
    })
}

/// Take the device from the first line of `ip route show default`, e.g.
/// "default via 192.168.1.1 dev wlp2s0 proto dhcp metric 600".
pub fn parse_ip_route(output: &str) -> Option<String> {
    let line = output.lines().next()?;
    let mut items = line.split_whitespace();
    items.find(|item| *item == "dev")?;
    items.next().map(str::to_string)
}
