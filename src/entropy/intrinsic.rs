//! Single-attempt wrappers around the RNG instructions.
//!
//! Everything above this module sees an instruction as "one call, one word,
//! one success flag". Retrying is the extraction engine's job.

use crate::error::Error;

use super::cpuid::CpuFeatures;
use super::HardwareSource;

/// Outcome of a single instruction execution. `value` is meaningless when
/// `succeeded` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub value: u64,
    pub succeeded: bool,
}

impl Attempt {
    pub fn success(value: u64) -> Self {
        Self {
            value,
            succeeded: true,
        }
    }

    pub fn failure() -> Self {
        Self {
            value: 0,
            succeeded: false,
        }
    }
}

/// A hardware random-number generator that produces one 64-bit word per call.
pub trait HardwareRng {
    fn source(&self) -> HardwareSource;

    fn attempt(&mut self) -> Attempt;
}

/// The running CPU's RDRAND or RDSEED instruction.
///
/// Only constructible for an instruction the CPU advertises, so `attempt`
/// never executes an unsupported opcode.
#[derive(Debug)]
pub struct CpuRng {
    source: HardwareSource,
}

impl CpuRng {
    pub fn new(source: HardwareSource) -> Result<Self, Error> {
        if !CpuFeatures::probe().supports(source) {
            return Err(Error::Unsupported(format!(
                "{} not supported on this CPU",
                source
            )));
        }
        Ok(Self { source })
    }
}

impl HardwareRng for CpuRng {
    fn source(&self) -> HardwareSource {
        self.source
    }

    #[cfg(target_arch = "x86_64")]
    fn attempt(&mut self) -> Attempt {
        // SAFETY: `new` verified the CPUID feature bit for this instruction.
        unsafe {
            match self.source {
                HardwareSource::FastReseed => x86::rdrand_step(),
                HardwareSource::TrueEntropy => x86::rdseed_step(),
            }
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn attempt(&mut self) -> Attempt {
        Attempt::failure()
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use core::arch::x86_64::{_rdrand64_step, _rdseed64_step};

    use super::Attempt;

    /// Executes RDRAND once; CF is reported through the intrinsic's return.
    ///
    /// # Safety
    /// The CPU must support RDRAND.
    #[target_feature(enable = "rdrand")]
    pub unsafe fn rdrand_step() -> Attempt {
        let mut value = 0u64;
        if _rdrand64_step(&mut value) == 1 {
            Attempt::success(value)
        } else {
            Attempt::failure()
        }
    }

    /// Executes RDSEED once.
    ///
    /// # Safety
    /// The CPU must support RDSEED.
    #[target_feature(enable = "rdseed")]
    pub unsafe fn rdseed_step() -> Attempt {
        let mut value = 0u64;
        if _rdseed64_step(&mut value) == 1 {
            Attempt::success(value)
        } else {
            Attempt::failure()
        }
    }
}
