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


use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use common::logutil;
use config::BwmeterConfig;
use model::Meter;
use model::Resolver;
use model::Sampler;
use model::SessionStore;
use slog::error;
use slog::info;

mod server;
#[cfg(test)]
mod test;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Opt {
    #[arg(long, default_value = config::BWMETER_DEFAULT_CONF)]
    config: PathBuf,
    #[arg(short, long)]
    debug: bool,
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the bandwidth chart page and its JSON endpoint (default)
    Serve {
        /// Override listen_addr from the config file
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Measure in the foreground and print one JSON response per window
    Sample {
        /// Interface to measure. Detected from the default route if omitted
        #[arg(short, long)]
        interface: Option<String>,
        #[arg(short, long, default_value = "1")]
        count: u64,
    },
}

fn build_meter(config: &BwmeterConfig, logger: &slog::Logger) -> Result<Meter> {
    let source = model::select_source(config.platform, &config.source_paths())
        .context("Failed to set up network counter source")?;
    info!(logger, "Reading counters from the {} source", source.name());

    Ok(Meter::new(
        Resolver::new(
            source.clone(),
            config.common_interfaces.clone(),
            logger.clone(),
        ),
        Sampler::new(source, config.sample_interval(), logger.clone()),
        SessionStore::new(config.history_len, config.session_ttl()),
        logger.clone(),
    ))
}

/// Poll `count` times in one session, writing each response as a JSON
/// line. Stops at the first error response.
async fn sample<W: Write>(
    meter: &Meter,
    interface: Option<String>,
    count: u64,
    out: &mut W,
) -> Result<()> {
    let session = meter.sessions().touch_or_create(None);
    for _ in 0..count {
        let response = meter.poll(&session, interface.clone()).await;
        writeln!(
            out,
            "{}",
            response.to_json().context("Failed to serialize response")?
        )
        .context("Failed to write response")?;
        if !response.is_success() {
            bail!("Sampling failed");
        }
    }
    Ok(())
}

fn run(config: &BwmeterConfig, logger: slog::Logger, cmd: Command) -> Result<()> {
    let meter = Arc::new(build_meter(config, &logger)?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    match cmd {
        Command::Serve { listen } => runtime.block_on(server::serve(
            meter,
            listen.unwrap_or(config.listen_addr),
            logger,
        )),
        Command::Sample { interface, count } => {
            let mut stdout = std::io::stdout().lock();
            runtime.block_on(sample(&meter, interface, count, &mut stdout))
        }
    }
}

#[cfg(feature = "enable_backtrace")]
pub fn get_backtrace() -> impl std::fmt::Display {
    std::backtrace::Backtrace::force_capture()
}

#[cfg(not(feature = "enable_backtrace"))]
pub fn get_backtrace() -> impl std::fmt::Display {
    "Backtrace is not available."
}

fn setup_log_on_panic(logger: slog::Logger) {
    std::panic::set_hook(Box::new(move |info| {
        let backtrace = get_backtrace();

        let msg = match info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match info.payload().downcast_ref::<String>() {
                Some(s) => &**s,
                None => "Unknown panic object",
            },
        };

        match info.location() {
            Some(location) => {
                error!(
                    logger,
                    "panic '{}': {}:{}\n{}",
                    msg,
                    location.file(),
                    location.line(),
                    backtrace
                );
            }
            None => {
                error!(logger, "panic '{}'\n{}", msg, backtrace);
            }
        }
    }));
}

fn main() {
    let opts = Opt::parse();
    let bwmeter_config = match BwmeterConfig::load(&opts.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            exit(1);
        }
    };
    let bwmeter_config = config::BWMETER_CONFIG.get_or_init(|| bwmeter_config);

    let logger = logutil::setup(bwmeter_config.log_path().as_deref(), opts.debug);
    setup_log_on_panic(logger.clone());

    let cmd = opts.cmd.unwrap_or(Command::Serve { listen: None });
    let rc = match run(bwmeter_config, logger.clone(), cmd) {
        Ok(()) => 0,
        Err(e) => {
            error!(logger, "{:#}", e);
            1
        }
    };
    exit(rc);
}
