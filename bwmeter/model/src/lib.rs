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

use std::sync::Arc;

use netfs::CounterSource;
use netfs::PlatformKind;
use netfs::SourcePaths;
use slog::warn;
use thiserror::Error;
use tokio::task::JoinError;

mod history;
mod resolver;
mod response;
mod sampler;
mod session;

pub use history::*;
pub use resolver::*;
pub use response::*;
pub use sampler::*;
pub use session::*;

#[cfg(test)]
mod test;

#[derive(Error, Debug)]
pub enum SampleError {
    #[error("Requested interface '{0}' not found or not active")]
    InterfaceNotFound(String),
    #[error("Could not detect default network interface")]
    NoInterfaceDetected,
    #[error("Failed to read counters of interface '{interface}': {source}")]
    CounterReadError {
        interface: String,
        #[source]
        source: netfs::Error,
    },
    #[error("Unable to guess OS: {0}")]
    UnsupportedPlatform(String),
    #[error("Counter source unavailable: {0}")]
    SourceUnavailable(#[source] netfs::Error),
    #[error("Measurement cancelled")]
    Cancelled,
}

/// Pick the counter source for this host. Done once at startup.
pub fn select_source(
    kind: PlatformKind,
    paths: &SourcePaths,
) -> Result<Arc<dyn CounterSource>, SampleError> {
    netfs::new_counter_source(kind, paths).map_err(|e| match e {
        netfs::Error::UnsupportedPlatform(os) => SampleError::UnsupportedPlatform(os),
        e => SampleError::SourceUnavailable(e),
    })
}

/// Run blocking OS work off the async workers. A panic in `f` is resumed
/// in the caller.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, SampleError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    join_outcome(tokio::task::spawn_blocking(f).await)
}

/// A task cancelled before it ran (runtime shutting down) is an error.
fn join_outcome<T>(res: Result<T, JoinError>) -> Result<T, SampleError> {
    match res {
        Ok(v) => Ok(v),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(SampleError::Cancelled),
    }
}

/// One poll end to end: resolve the interface, measure, record into the
/// caller's session and build the response.
pub struct Meter {
    resolver: Arc<Resolver>,
    sampler: Sampler,
    sessions: SessionStore,
    logger: slog::Logger,
}

impl Meter {
    pub fn new(
        resolver: Resolver,
        sampler: Sampler,
        sessions: SessionStore,
        logger: slog::Logger,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            sampler,
            sessions,
            logger,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Resolve the interface and take one measurement.
    pub async fn measure(
        &self,
        requested: Option<String>,
    ) -> Result<(String, RatePoint), SampleError> {
        let resolver = self.resolver.clone();
        let interface = run_blocking(move || resolver.resolve(requested.as_deref())).await??;
        let point = self.sampler.sample(&interface).await?;
        Ok((interface, point))
    }

    pub async fn poll(&self, session: &SessionId, requested: Option<String>) -> Response {
        match self.measure(requested).await {
            Ok((interface, point)) => {
                let history = self.sessions.record(session, point);
                Response::success(interface, &history)
            }
            Err(e) => {
                warn!(self.logger, "Poll failed: {:#}", e; "session" => session.as_str());
                Response::error(&e)
            }
        }
    }
}
