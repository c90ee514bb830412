pub mod cpuid;
pub mod extract;
pub mod intrinsic;

use std::fmt;

use crate::config::CpuRngConfig;
use crate::error::Error;

use self::cpuid::CpuFeatures;
use self::intrinsic::CpuRng;

/// Words per RDRAND batch. The DRNG reseeds at least once every 1022 64-bit
/// outputs, so a batch this size always spans a reseed.
const FAST_RESEED_WORDS: usize = 1024;

/// RDRAND's DRBG seed is 256 bits; that bounds the fresh entropy in any batch.
const FAST_RESEED_ENTROPY_BITS: u32 = 256;

const TRUE_ENTROPY_WORDS: usize = 128;

/// A CPU random-number instruction this daemon can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareSource {
    /// RDRAND: DRBG output, reseeded from the on-chip conditioner.
    FastReseed,
    /// RDSEED: conditioned entropy source output, full entropy per bit.
    TrueEntropy,
}

impl HardwareSource {
    pub fn instruction(&self) -> &'static str {
        match self {
            HardwareSource::FastReseed => "RDRAND",
            HardwareSource::TrueEntropy => "RDSEED",
        }
    }

    pub fn word_count(&self) -> usize {
        match self {
            HardwareSource::FastReseed => FAST_RESEED_WORDS,
            HardwareSource::TrueEntropy => TRUE_ENTROPY_WORDS,
        }
    }

    /// Entropy credited for one full batch. This is a declared constant, never
    /// a measurement.
    pub fn declared_entropy_bits(&self) -> u32 {
        match self {
            HardwareSource::FastReseed => FAST_RESEED_ENTROPY_BITS,
            HardwareSource::TrueEntropy => 64 * TRUE_ENTROPY_WORDS as u32,
        }
    }

    pub fn retries(&self, config: &CpuRngConfig) -> u32 {
        match self {
            HardwareSource::FastReseed => config.rdrand_retries,
            HardwareSource::TrueEntropy => config.rdseed_retries,
        }
    }

    pub fn params(&self, config: &CpuRngConfig) -> SourceParams {
        SourceParams {
            source: *self,
            words: self.word_count(),
            retries: self.retries(config),
            entropy_bits: self.declared_entropy_bits(),
        }
    }
}

impl fmt::Display for HardwareSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.instruction())
    }
}

/// Fixed extraction parameters for the source chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceParams {
    pub source: HardwareSource,
    pub words: usize,
    pub retries: u32,
    pub entropy_bits: u32,
}

impl SourceParams {
    pub fn byte_length(&self) -> usize {
        self.words * 8
    }
}

/// Detects the CPU's RNG instructions and picks the one to use for the
/// lifetime of the process.
pub fn select_source(config: &CpuRngConfig) -> Result<(CpuRng, SourceParams), Error> {
    let features = CpuFeatures::probe();
    log::debug!(
        "cpuid: rdrand={} rdseed={}",
        features.has_rdrand(),
        features.has_rdseed()
    );
    let source = cpuid::detect(&features, config.source)?;
    log::info!("CPU has {} support", source);
    let rng = CpuRng::new(source)?;
    Ok((rng, source.params(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_reseed_params() {
        let p = HardwareSource::FastReseed.params(&CpuRngConfig::default());
        assert_eq!(p.words, 1024);
        assert_eq!(p.retries, 10);
        assert_eq!(p.entropy_bits, 256);
        assert_eq!(p.byte_length(), 8192);
    }

    #[test]
    fn test_true_entropy_params() {
        let p = HardwareSource::TrueEntropy.params(&CpuRngConfig::default());
        assert_eq!(p.words, 128);
        assert_eq!(p.retries, 64);
        assert_eq!(p.entropy_bits, 64 * 128);
        assert_eq!(p.byte_length(), 1024);
    }

    #[test]
    fn test_fast_reseed_credit_independent_of_size() {
        // One seed's worth, however many words are drawn
        let p = HardwareSource::FastReseed.params(&CpuRngConfig::default());
        assert!(p.entropy_bits < (p.words as u32) * 64);
    }

    #[test]
    fn test_retries_follow_config() {
        let config = CpuRngConfig {
            rdrand_retries: 3,
            rdseed_retries: 7,
            ..Default::default()
        };
        assert_eq!(HardwareSource::FastReseed.retries(&config), 3);
        assert_eq!(HardwareSource::TrueEntropy.retries(&config), 7);
    }

    #[test]
    fn test_select_source_follows_cpu() {
        let features = CpuFeatures::probe();
        match select_source(&CpuRngConfig::default()) {
            Ok((rng, params)) => {
                assert!(features.supports(params.source));
                assert_eq!(intrinsic::HardwareRng::source(&rng), params.source);
            }
            Err(e) => {
                assert!(!features.has_rdrand() && !features.has_rdseed());
                assert!(e.is_structural());
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(HardwareSource::FastReseed.to_string(), "RDRAND");
        assert_eq!(HardwareSource::TrueEntropy.to_string(), "RDSEED");
    }
}
