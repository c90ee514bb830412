//! CPU capability detection for the hardware RNG instructions.

use crate::config::SourcePreference;
use crate::error::Error;

use super::HardwareSource;

/// CPUID leaf 1, ECX bit 30.
const RDRAND_ECX_BIT: u32 = 1 << 30;

/// CPUID leaf 7 subleaf 0, EBX bit 18.
const RDSEED_EBX_BIT: u32 = 1 << 18;

/// The CPUID registers that carry RNG feature bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuFeatures {
    pub leaf1_ecx: u32,
    pub leaf7_ebx: u32,
}

impl CpuFeatures {
    /// Reads the feature registers of the running CPU.
    #[cfg(target_arch = "x86_64")]
    #[allow(unused_unsafe)]
    pub fn probe() -> Self {
        use core::arch::x86_64::{__cpuid, __cpuid_count};

        // SAFETY: CPUID is always available on x86_64, and leaf 7 is only
        // queried when the maximum basic leaf covers it.
        unsafe {
            let max_leaf = __cpuid(0).eax;
            Self {
                leaf1_ecx: __cpuid(1).ecx,
                leaf7_ebx: if max_leaf >= 7 { __cpuid_count(7, 0).ebx } else { 0 },
            }
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    pub fn probe() -> Self {
        Self::default()
    }

    pub fn has_rdrand(&self) -> bool {
        self.leaf1_ecx & RDRAND_ECX_BIT != 0
    }

    pub fn has_rdseed(&self) -> bool {
        self.leaf7_ebx & RDSEED_EBX_BIT != 0
    }

    pub fn supports(&self, source: HardwareSource) -> bool {
        match source {
            HardwareSource::FastReseed => self.has_rdrand(),
            HardwareSource::TrueEntropy => self.has_rdseed(),
        }
    }
}

/// Chooses the hardware source to use for the lifetime of the process.
///
/// With `Auto`, RDSEED wins over RDRAND because every RDSEED output bit is
/// credited as entropy. A forced preference the CPU cannot honour is an error,
/// never a silent fallback.
pub fn detect(features: &CpuFeatures, preference: SourcePreference) -> Result<HardwareSource, Error> {
    match preference {
        SourcePreference::Auto => {
            if features.has_rdseed() {
                Ok(HardwareSource::TrueEntropy)
            } else if features.has_rdrand() {
                Ok(HardwareSource::FastReseed)
            } else {
                Err(Error::Unsupported(
                    "this CPU supports neither RDSEED nor RDRAND".into(),
                ))
            }
        }
        SourcePreference::Rdseed => require(features, HardwareSource::TrueEntropy),
        SourcePreference::Rdrand => require(features, HardwareSource::FastReseed),
    }
}

fn require(features: &CpuFeatures, source: HardwareSource) -> Result<HardwareSource, Error> {
    if features.supports(source) {
        Ok(source)
    } else {
        Err(Error::Unsupported(format!(
            "{} requested but not supported by this CPU",
            source
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: CpuFeatures = CpuFeatures {
        leaf1_ecx: RDRAND_ECX_BIT,
        leaf7_ebx: RDSEED_EBX_BIT,
    };

    #[test]
    fn test_prefers_rdseed_when_both_present() {
        let source = detect(&BOTH, SourcePreference::Auto).unwrap();
        assert_eq!(source, HardwareSource::TrueEntropy);
    }

    #[test]
    fn test_rdrand_only() {
        let features = CpuFeatures {
            leaf1_ecx: RDRAND_ECX_BIT,
            leaf7_ebx: 0,
        };
        let source = detect(&features, SourcePreference::Auto).unwrap();
        assert_eq!(source, HardwareSource::FastReseed);
    }

    #[test]
    fn test_rdseed_only() {
        let features = CpuFeatures {
            leaf1_ecx: 0,
            leaf7_ebx: RDSEED_EBX_BIT,
        };
        let source = detect(&features, SourcePreference::Auto).unwrap();
        assert_eq!(source, HardwareSource::TrueEntropy);
    }

    #[test]
    fn test_neither_is_unsupported() {
        let err = detect(&CpuFeatures::default(), SourcePreference::Auto).unwrap_err();
        assert!(err.is_structural());
        let msg = err.to_string();
        assert!(msg.contains("RDSEED"));
        assert!(msg.contains("RDRAND"));
    }

    #[test]
    fn test_bits_are_distinct() {
        // Neighbouring bits (F16C is leaf 1 ECX bit 29) must not count
        let features = CpuFeatures {
            leaf1_ecx: !RDRAND_ECX_BIT,
            leaf7_ebx: !RDSEED_EBX_BIT,
        };
        assert!(!features.has_rdrand());
        assert!(!features.has_rdseed());

        // RDRAND's bit in the RDSEED register means nothing, and vice versa
        let swapped = CpuFeatures {
            leaf1_ecx: RDSEED_EBX_BIT,
            leaf7_ebx: RDRAND_ECX_BIT,
        };
        assert!(!swapped.has_rdrand());
        assert!(!swapped.has_rdseed());
    }

    #[test]
    fn test_forced_preference() {
        assert_eq!(
            detect(&BOTH, SourcePreference::Rdrand).unwrap(),
            HardwareSource::FastReseed
        );
        assert_eq!(
            detect(&BOTH, SourcePreference::Rdseed).unwrap(),
            HardwareSource::TrueEntropy
        );
    }

    #[test]
    fn test_forced_preference_missing_is_unsupported() {
        let features = CpuFeatures {
            leaf1_ecx: RDRAND_ECX_BIT,
            leaf7_ebx: 0,
        };
        let err = detect(&features, SourcePreference::Rdseed).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(err.to_string().contains("RDSEED requested"));
    }

    #[test]
    fn test_probe_is_consistent() {
        let a = CpuFeatures::probe();
        let b = CpuFeatures::probe();
        assert_eq!(a.has_rdrand(), b.has_rdrand());
        assert_eq!(a.has_rdseed(), b.has_rdseed());
    }
}
