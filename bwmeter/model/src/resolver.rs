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

use netfs::CounterSource;
use netfs::MAX_IFACE_NAME_LEN;
use slog::debug;
use slog::warn;

use crate::SampleError;

/// Names we are willing to hand to the OS. Anything else cannot be a real
/// interface and could escape the sysfs directory.
pub fn is_valid_interface_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IFACE_NAME_LEN
        && name != "."
        && name != ".."
        && !name
            .chars()
            .any(|c| c == '/' || c == '\0' || c.is_whitespace())
}

/// Picks the interface to measure, re-resolved on every request.
pub struct Resolver {
    source: Arc<dyn CounterSource>,
    common_interfaces: Vec<String>,
    logger: slog::Logger,
}

impl Resolver {
    pub fn new(
        source: Arc<dyn CounterSource>,
        common_interfaces: Vec<String>,
        logger: slog::Logger,
    ) -> Self {
        Self {
            source,
            common_interfaces,
            logger,
        }
    }

    fn validate(&self, name: &str) -> bool {
        is_valid_interface_name(name) && self.source.interface_exists(name)
    }

    /// Validate `requested` if given, otherwise detect the default route
    /// interface and fall back to probing well known names.
    pub fn resolve(&self, requested: Option<&str>) -> Result<String, SampleError> {
        if let Some(requested) = requested.filter(|r| !r.is_empty()).map(str::trim) {
            return if self.validate(requested) {
                Ok(requested.to_string())
            } else {
                Err(SampleError::InterfaceNotFound(requested.to_string()))
            };
        }

        match self.source.default_interface() {
            Some(iface) if self.validate(&iface) => {
                debug!(self.logger, "Using default route interface {}", iface);
                return Ok(iface);
            }
            Some(iface) => warn!(
                self.logger,
                "Default route interface {} is not usable, probing common names", iface
            ),
            None => debug!(self.logger, "No default route interface found"),
        }

        self.common_interfaces
            .iter()
            .find(|iface| self.validate(iface))
            .cloned()
            .ok_or(SampleError::NoInterfaceDetected)
    }
}
