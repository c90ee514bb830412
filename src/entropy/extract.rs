//! Batch extraction with per-word bounded retry.

use crate::batch::EntropyBatch;
use crate::error::Error;

use super::intrinsic::HardwareRng;
use super::SourceParams;

/// Runs the instruction up to `budget` times and returns the first word it
/// reports as valid.
pub fn retry_word<R: HardwareRng + ?Sized>(rng: &mut R, budget: u32) -> Option<u64> {
    (0..budget).find_map(|_| {
        let attempt = rng.attempt();
        attempt.succeeded.then_some(attempt.value)
    })
}

/// Fills a fresh batch with `params.words` words.
///
/// A word that exhausts its retry budget is tallied and extraction moves on,
/// but the batch is only returned if every word succeeded. A partial batch is
/// scrubbed and reported as `Error::Exhausted`.
pub fn extract<R: HardwareRng + ?Sized>(
    rng: &mut R,
    params: &SourceParams,
) -> Result<EntropyBatch, Error> {
    let mut batch = EntropyBatch::zeroed(params.words, params.entropy_bits);
    let mut failed = 0usize;

    for slot in batch.words_mut() {
        match retry_word(rng, params.retries) {
            Some(value) => *slot = value,
            None => failed += 1,
        }
    }

    if failed > 0 {
        return Err(Error::Exhausted {
            source: params.source,
            failed,
            words: params.words,
            retries: params.retries,
        });
    }

    Ok(batch)
}

#[cfg(test)]
pub(crate) mod mock {
    use crate::entropy::intrinsic::{Attempt, HardwareRng};
    use crate::entropy::HardwareSource;

    /// Always succeeds, yielding 1, 2, 3, ...
    pub struct CountingRng {
        pub source: HardwareSource,
        pub next: u64,
        pub attempts: u64,
    }

    impl CountingRng {
        pub fn new(source: HardwareSource) -> Self {
            Self {
                source,
                next: 1,
                attempts: 0,
            }
        }
    }

    impl HardwareRng for CountingRng {
        fn source(&self) -> HardwareSource {
            self.source
        }

        fn attempt(&mut self) -> Attempt {
            self.attempts += 1;
            let value = self.next;
            self.next += 1;
            Attempt::success(value)
        }
    }

    /// Replays a fixed success/failure pattern, then succeeds forever.
    pub struct ScriptedRng {
        pub script: Vec<bool>,
        pub attempts: usize,
    }

    impl ScriptedRng {
        pub fn new(script: Vec<bool>) -> Self {
            Self {
                script,
                attempts: 0,
            }
        }
    }

    impl HardwareRng for ScriptedRng {
        fn source(&self) -> HardwareSource {
            HardwareSource::FastReseed
        }

        fn attempt(&mut self) -> Attempt {
            let ok = self.script.get(self.attempts).copied().unwrap_or(true);
            self.attempts += 1;
            if ok {
                Attempt::success(0xC0FFEE + self.attempts as u64)
            } else {
                Attempt::failure()
            }
        }
    }
}
