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


use std::path::Path;
use std::path::PathBuf;

use crate::Counters;
use crate::CounterSource;
use crate::Error;
use crate::Result;
use crate::run_command;

// Column positions in `netstat -ibn` on macOS when no header is found
const NETSTAT_IBYTES_COL: usize = 6;
const NETSTAT_OBYTES_COL: usize = 9;

/// Reads interface counters by parsing `netstat` output. Used on FreeBSD,
/// macOS and the other BSDs, which have no sysfs.
pub struct BsdNetstat {
    netstat_path: PathBuf,
}

impl BsdNetstat {
    pub fn new(netstat_path: PathBuf) -> BsdNetstat {
        BsdNetstat { netstat_path }
    }
}

impl CounterSource for BsdNetstat {
    fn name(&self) -> &'static str {
        "bsd"
    }

    fn interface_exists(&self, interface: &str) -> bool {
        run_command(&self.netstat_path, &["-I", interface]).is_ok()
    }

    fn default_interface(&self) -> Option<String> {
        run_command(Path::new("route"), &["-n", "get", "default"])
            .ok()
            .and_then(|out| parse_route_get(&out))
    }

    fn read_counters(&self, interface: &str) -> Result<Counters> {
        let output = run_command(&self.netstat_path, &["-ibn"])?;
        parse_netstat_ibn(&output, interface, &self.netstat_path)?
            .ok_or_else(|| Error::InterfaceMissing(interface.to_string()))
    }
}

/// Pick the `interface:` value out of `route -n get default`.
pub fn parse_route_get(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("interface:")
            .map(str::trim)
            .filter(|iface| !iface.is_empty())
            .map(str::to_string)
    })
}

/// Find received and sent bytes for `interface` in `netstat -ibn` output.
///
/// Only the `<Link#N>` row carries the full interface totals. Column
/// positions come from the header since FreeBSD adds an `Idrop` column that
/// macOS lacks. Rows without a hardware address (loopback, tunnels) are one
/// column short; everything after `Address` shifts left by one.
pub fn parse_netstat_ibn(output: &str, interface: &str, path: &Path) -> Result<Option<Counters>> {
    let mut lines = output.lines().peekable();
    let header: Option<Vec<&str>> = match lines.peek().copied() {
        Some(line) if line.trim_start().starts_with("Name") => {
            lines.next();
            Some(line.split_whitespace().collect())
        }
        _ => None,
    };

    let (header_len, ibytes_col, obytes_col) = match header.as_ref() {
        Some(cols) => {
            let find = |name: &str| cols.iter().position(|c| *c == name);
            match (find("Ibytes"), find("Obytes")) {
                (Some(i), Some(o)) => (Some(cols.len()), i, o),
                _ => return Err(Error::InvalidFileFormat(path.to_path_buf())),
            }
        }
        None => (None, NETSTAT_IBYTES_COL, NETSTAT_OBYTES_COL),
    };

    for line in lines {
        let items: Vec<&str> = line.split_whitespace().collect();
        let name = match items.first() {
            // Down interfaces are marked with a trailing '*'
            Some(name) => name.trim_end_matches('*'),
            None => continue,
        };
        if name != interface || !items.get(2).is_some_and(|n| n.starts_with("<Link")) {
            continue;
        }

        let shift = match header_len {
            Some(len) if items.len() + 1 == len => 1,
            _ => 0,
        };
        let parse_col = |col: usize| -> Result<u64> {
            col.checked_sub(shift)
                .and_then(|col| items.get(col))
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| Error::UnexpectedLine(path.to_path_buf(), line.to_string()))
        };
        return Ok(Some(Counters {
            rx_bytes: parse_col(ibytes_col)?,
            tx_bytes: parse_col(obytes_col)?,
        }));
    }

    Ok(None)
}
