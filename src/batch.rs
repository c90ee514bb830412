use std::fmt;

use zeroize::Zeroize;

/// One extraction's worth of hardware RNG output plus its entropy claim.
///
/// The payload is scrubbed when the batch is consumed and again when it is
/// dropped, so no path leaves extracted words behind in memory.
pub struct EntropyBatch {
    entropy_bits: u32,
    words: Box<[u64]>,
}

impl EntropyBatch {
    /// Allocates a zero-filled batch of `word_count` words.
    pub fn zeroed(word_count: usize, entropy_bits: u32) -> Self {
        Self {
            entropy_bits,
            words: vec![0u64; word_count].into_boxed_slice(),
        }
    }

    pub fn declared_entropy_bits(&self) -> u32 {
        self.entropy_bits
    }

    #[cfg(test)]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn byte_length(&self) -> usize {
        self.words.len() * 8
    }

    #[cfg(test)]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }

    /// The payload in native byte order.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: u64 has no padding and u8 has alignment 1; the slice covers
        // exactly the boxed words and borrows `self`.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.byte_length()) }
    }

    /// Hands the batch to `f` once, then scrubs it whether `f` returns
    /// normally or unwinds.
    pub fn consume<T>(mut self, f: impl FnOnce(&EntropyBatch) -> T) -> T {
        self.with_payload(f)
    }

    fn with_payload<T>(&mut self, f: impl FnOnce(&EntropyBatch) -> T) -> T {
        let guard = ScrubOnExit(self);
        let out = f(&*guard.0);
        drop(guard);
        out
    }

    /// Overwrites every payload word with zero using volatile writes.
    pub fn scrub(&mut self) {
        self.words[..].zeroize();
    }
}

impl Drop for EntropyBatch {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl fmt::Debug for EntropyBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntropyBatch")
            .field("entropy_bits", &self.entropy_bits)
            .field("byte_length", &self.byte_length())
            .finish_non_exhaustive()
    }
}

struct ScrubOnExit<'a>(&'a mut EntropyBatch);

impl Drop for ScrubOnExit<'_> {
    fn drop(&mut self) {
        self.0.scrub();
    }
}
