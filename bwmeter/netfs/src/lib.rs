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
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use thiserror::Error;

mod bsd;
mod linux;
mod types;
pub use bsd::*;
pub use linux::*;
pub use types::*;


pub const NET_SYSFS: &str = "/sys/class/net/";
pub const NET_PROCFS: &str = "/proc/net";
pub const PATH_NETSTAT: &str = "/usr/sbin/netstat";

/// Longest name the kernel accepts for an interface (IFNAMSIZ - 1)
pub const MAX_IFACE_NAME_LEN: usize = 15;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid file format: {0:?}")]
    InvalidFileFormat(PathBuf),
    #[error("{1:?}: {0:?}")]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("Unexpected line ({1}) in: {0:?}")]
    UnexpectedLine(PathBuf, String),
    #[error("Command {command} exited with {status}")]
    CommandFailed { command: String, status: String },
    #[error("Interface {0} is not present")]
    InterfaceMissing(String),
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A source of per-interface byte counters.
///
/// Implementations are cheap to call repeatedly and never cache counters.
pub trait CounterSource: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Whether the OS currently reports an interface called `interface`.
    /// Any failure to ask counts as "no".
    fn interface_exists(&self, interface: &str) -> bool;

    /// Interface carrying the default route, if the OS will tell us.
    fn default_interface(&self) -> Option<String>;

    /// Read cumulative received and sent bytes of `interface`.
    fn read_counters(&self, interface: &str) -> Result<Counters>;
}

/// Where each counter source looks for its data
#[derive(Clone, Debug, PartialEq)]
pub struct SourcePaths {
    pub sysfs_net: PathBuf,
    pub procfs_net: PathBuf,
    pub netstat: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        SourcePaths {
            sysfs_net: NET_SYSFS.into(),
            procfs_net: NET_PROCFS.into(),
            netstat: PATH_NETSTAT.into(),
        }
    }
}

/// Select the counter source for `kind`, resolving `Auto` from the OS we
/// run on. Called once at startup.
pub fn new_counter_source(
    kind: PlatformKind,
    paths: &SourcePaths,
) -> Result<Arc<dyn CounterSource>> {
    match kind {
        PlatformKind::Linux => Ok(Arc::new(LinuxNetReader::new_with_custom_path(
            paths.sysfs_net.clone(),
            paths.procfs_net.clone(),
        )?)),
        PlatformKind::Bsd => Ok(Arc::new(BsdNetstat::new(paths.netstat.clone()))),
        PlatformKind::Auto => match PlatformKind::from_os_name(std::env::consts::OS) {
            Some(kind) => new_counter_source(kind, paths),
            None => Err(Error::UnsupportedPlatform(std::env::consts::OS.to_string())),
        },
    }
}

/// Run `program` with `args` and return its stdout. A non-zero exit is an
/// error.
fn run_command(program: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| Error::IoError(program.to_path_buf(), e))?;
    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: format!("{} {}", program.display(), args.join(" ")),
            status: output.status.to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
