use std::convert::Infallible;
use std::time::Duration;

use crate::config::{Config, FeedConfig};
use crate::entropy::extract::extract;
use crate::entropy::intrinsic::HardwareRng;
use crate::entropy::{self, SourceParams};
use crate::error::Error;
use crate::pool::{BlockingPool, EntropySink, KernelPool, Readiness};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// Feed the blocking pool until it reports the fill watermark.
    FillBlocking,
    /// Top up the non-blocking pool with one batch.
    FillNonBlocking,
    /// Sleep until the blocking pool wants more, or the ceiling passes.
    WaitForDemand,
}

/// What happened during one fill cycle, for the summary log line.
#[derive(Debug, Default, Clone, Copy)]
struct CycleStats {
    batches: u32,
    credited_bits: u64,
    failed: u32,
    last_count: Option<u32>,
}

/// Drives entropy from one hardware source into the two kernel pools.
///
/// The non-blocking pool gets exactly one batch per cycle with no watermark
/// check, matching the behaviour this daemon has always had.
pub struct FeedController<R, B, N> {
    rng: R,
    params: SourceParams,
    blocking: B,
    nonblocking: N,
    fill_watermark: u32,
    max_sleep: Duration,
    state: FeedState,
    cycle: CycleStats,
}

impl<R, B, N> FeedController<R, B, N>
where
    R: HardwareRng,
    B: BlockingPool,
    N: EntropySink,
{
    pub fn new(rng: R, params: SourceParams, blocking: B, nonblocking: N, feed: &FeedConfig) -> Self {
        Self {
            rng,
            params,
            blocking,
            nonblocking,
            fill_watermark: feed.fill_watermark,
            max_sleep: feed.max_sleep(),
            state: FeedState::FillBlocking,
            cycle: CycleStats::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> FeedState {
        self.state
    }

    /// Performs the work of the current state and moves to the next one.
    ///
    /// Only structural failures (extraction exhaustion) are returned; pool
    /// I/O errors are logged and absorbed.
    pub fn step(&mut self) -> Result<(), Error> {
        let next = match self.state {
            FeedState::FillBlocking => self.fill_blocking()?,
            FeedState::FillNonBlocking => self.fill_nonblocking()?,
            FeedState::WaitForDemand => self.wait_for_demand(),
        };
        log::trace!(target: "rdfeed::daemon", "{:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Runs the feed loop until a structural failure.
    pub fn run(&mut self) -> Result<Infallible, Error> {
        loop {
            self.step()?;
        }
    }

    fn fill_blocking(&mut self) -> Result<FeedState, Error> {
        if submit(&mut self.rng, &self.params, &mut self.blocking, "blocking")? {
            self.cycle.batches += 1;
            self.cycle.credited_bits += u64::from(self.params.entropy_bits);
        } else {
            self.cycle.failed += 1;
        }

        match self.blocking.entropy_count() {
            Ok(count) => {
                self.cycle.last_count = Some(count);
                if count < self.fill_watermark {
                    Ok(FeedState::FillBlocking)
                } else {
                    Ok(FeedState::FillNonBlocking)
                }
            }
            Err(e) => {
                log::warn!(
                    target: "rdfeed::daemon",
                    "cannot read blocking pool entropy count, stopping fill: {}", e,
                );
                Ok(FeedState::FillNonBlocking)
            }
        }
    }

    fn fill_nonblocking(&mut self) -> Result<FeedState, Error> {
        let topped_up = submit(&mut self.rng, &self.params, &mut self.nonblocking, "non-blocking")?;

        let cycle = std::mem::take(&mut self.cycle);
        let count = cycle
            .last_count
            .map_or_else(|| "unknown".to_string(), |c| format!("{}bits", c));
        log::info!(
            target: "rdfeed::daemon",
            "fed blocking pool {} batches ({}bits credit, {} failed), entropy now {}; non-blocking top-up {}",
            cycle.batches,
            cycle.credited_bits,
            cycle.failed,
            count,
            if topped_up { "ok" } else { "failed" },
        );

        Ok(FeedState::WaitForDemand)
    }

    fn wait_for_demand(&mut self) -> FeedState {
        match self.blocking.wait_for_demand(self.max_sleep) {
            Ok(Readiness::Ready) => {
                log::debug!(target: "rdfeed::daemon", "blocking pool requested entropy");
            }
            Ok(Readiness::TimedOut) => {
                log::debug!(
                    target: "rdfeed::daemon",
                    "no demand within {}ms, topping up anyway",
                    self.max_sleep.as_millis(),
                );
            }
            Err(e) => {
                log::error!(target: "rdfeed::daemon", "poll failed: {}", e);
            }
        }
        FeedState::FillBlocking
    }
}

/// Extracts one batch and hands it to `sink`. The batch is scrubbed whatever
/// the sink does with it. Returns whether the sink accepted it.
fn submit<R, S>(rng: &mut R, params: &SourceParams, sink: &mut S, pool: &str) -> Result<bool, Error>
where
    R: HardwareRng + ?Sized,
    S: EntropySink + ?Sized,
{
    let batch = extract(rng, params)?;
    let (bytes, bits) = (batch.byte_length(), batch.declared_entropy_bits());
    match batch.consume(|b| sink.add_entropy(b)) {
        Ok(()) => {
            log::debug!(
                target: "rdfeed::daemon",
                "injected {}B ({}bits credit) into {} pool", bytes, bits, pool,
            );
            Ok(true)
        }
        Err(e) => {
            log::error!(
                target: "rdfeed::daemon",
                "failed to add entropy to {} pool: {}", pool, e,
            );
            Ok(false)
        }
    }
}

pub fn run(config: &Config) -> Result<Infallible, Error> {
    let (rng, params) = entropy::select_source(&config.cpu_rng)?;

    let blocking = KernelPool::open(&config.feed.random_device);
    let nonblocking = KernelPool::open(&config.feed.urandom_device);

    log::info!(
        target: "rdfeed::daemon",
        "started: source={} batch={}B credit={}bits watermark={}bits max-sleep={}ms pools={},{}",
        params.source,
        params.byte_length(),
        params.entropy_bits,
        config.feed.fill_watermark,
        config.feed.max_sleep_ms,
        blocking.path().display(),
        nonblocking.path().display(),
    );

    FeedController::new(rng, params, blocking, nonblocking, &config.feed).run()
}
