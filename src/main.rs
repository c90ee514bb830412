mod batch;
mod cli;
mod config;
mod daemon;
mod dump;
mod entropy;
mod error;
mod logging;
mod output;
mod pool;

use std::path::Path;
use std::process;

use clap::Parser;

use cli::{Cli, Command, CpuRngArgs, FeedArgs};
use config::Config;
use error::Error;

/// Build the Config by layering: defaults → TOML file → CLI overrides.
fn build_config(config_file: Option<&Path>, cpu_rng_args: &CpuRngArgs, feed_args: Option<&FeedArgs>) -> Config {
    let mut cfg = match config::load_config(config_file) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("{}", e);
            Config::default()
        }
    };

    // Apply CLI overrides (only if explicitly set)
    if let Some(v) = cpu_rng_args.source {
        cfg.cpu_rng.source = v;
    }
    if let Some(v) = cpu_rng_args.rdrand_retries {
        cfg.cpu_rng.rdrand_retries = v;
    }
    if let Some(v) = cpu_rng_args.rdseed_retries {
        cfg.cpu_rng.rdseed_retries = v;
    }

    if let Some(feed) = feed_args {
        if let Some(v) = feed.fill_watermark {
            cfg.feed.fill_watermark = v;
        }
        if let Some(v) = feed.max_sleep_ms {
            cfg.feed.max_sleep_ms = v;
        }
        if let Some(ref v) = feed.random_device {
            cfg.feed.random_device = v.clone();
        }
        if let Some(ref v) = feed.urandom_device {
            cfg.feed.urandom_device = v.clone();
        }
    }

    cfg.validate();
    cfg
}

fn exit_with(e: &Error) -> ! {
    if e.is_structural() {
        log::error!(target: "rdfeed::daemon", "fatal: {}", e);
    } else {
        log::error!("{}", e);
    }
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::Dump(args)) => {
            logging::init(&args.log, false);
            let cfg = build_config(args.config_file.as_deref(), &args.cpu_rng, None);
            if let Err(e) = dump::run(args, &cfg) {
                exit_with(&e);
            }
        }
        None => {
            logging::init(&cli.log, true);
            let cfg = build_config(cli.config_file.as_deref(), &cli.cpu_rng, Some(&cli.feed));
            match daemon::run(&cfg) {
                Ok(never) => match never {},
                Err(e) => exit_with(&e),
            }
        }
    }
}
