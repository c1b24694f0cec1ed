//! TPM-backed attestation (spec.md §4.8): 24 PCRs extended with
//! SHA-256, sealing/unsealing gated on PCR equality, and signed quotes
//! over a caller nonce. `sha2`'s `force-soft` feature (the same crate
//! and feature flag `amoljassal-sis-kernel-showcase`'s kernel crate
//! pins for in-kernel hashing, avoiding a hardware SHA extension
//! dependency) does the actual digesting; everything else here is
//! bookkeeping over fixed-size PCR registers.

extern crate alloc;

use alloc::vec::Vec;

use kernel_error::{KernelError, KernelResult};
use kernel_sync::spinlock::Spinlock;
use sha2::{Digest, Sha256};

pub const PCR_COUNT: usize = 24;
pub const PCR_SIZE: usize = 32;

/// PCRs below this index can never be reset (spec.md §4.8/§8): they
/// measure the boot chain, so a reset mid-boot would defeat the point.
pub const FIRST_RESETTABLE_PCR: usize = 16;

pub type PcrValue = [u8; PCR_SIZE];

struct Inner {
    pcrs: [PcrValue; PCR_COUNT],
    extend_counts: [u32; PCR_COUNT],
}

pub struct Tpm {
    inner: Spinlock<Inner>,
}

#[derive(Clone)]
pub struct Sealed {
    pcr_set: Vec<u8>,
    pcr_snapshot: Vec<PcrValue>,
    ciphertext: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Quote {
    pub pcr_set: Vec<u8>,
    pub pcr_values: Vec<PcrValue>,
    pub nonce: Vec<u8>,
    pub signature: PcrValue,
}

fn hash_concat(parts: &[&[u8]]) -> PcrValue {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Derives a keystream byte `i` from `key`, long enough to XOR against
/// data of any length (SHA-256 output re-hashed with a counter).
fn keystream_byte(key: &PcrValue, index: usize) -> u8 {
    let block = index / PCR_SIZE;
    let digest = hash_concat(&[key, &(block as u64).to_le_bytes()]);
    digest[index % PCR_SIZE]
}

fn xor_with_key(key: &PcrValue, data: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, byte)| byte ^ keystream_byte(key, i))
        .collect()
}

impl Tpm {
    pub const fn new() -> Self {
        Self {
            inner: Spinlock::new(Inner {
                pcrs: [[0u8; PCR_SIZE]; PCR_COUNT],
                extend_counts: [0u32; PCR_COUNT],
            }),
        }
    }

    /// `value <- H(value || data)` (spec.md §4.8).
    pub fn extend(&self, index: usize, data: &[u8]) -> KernelResult<()> {
        if index >= PCR_COUNT {
            return Err(KernelError::InvalidArgument);
        }
        let mut inner = self.inner.lock();
        let new_value = hash_concat(&[&inner.pcrs[index], data]);
        inner.pcrs[index] = new_value;
        inner.extend_counts[index] += 1;
        Ok(())
    }

    pub fn read(&self, index: usize) -> KernelResult<PcrValue> {
        if index >= PCR_COUNT {
            return Err(KernelError::InvalidArgument);
        }
        Ok(self.inner.lock().pcrs[index])
    }

    pub fn extend_count(&self, index: usize) -> KernelResult<u32> {
        if index >= PCR_COUNT {
            return Err(KernelError::InvalidArgument);
        }
        Ok(self.inner.lock().extend_counts[index])
    }

    /// Resets PCR `index` to all-zero. PCRs 0-15 are not resettable
    /// (spec.md §4.8/§8).
    pub fn reset(&self, index: usize) -> KernelResult<()> {
        if index >= PCR_COUNT {
            return Err(KernelError::InvalidArgument);
        }
        if index < FIRST_RESETTABLE_PCR {
            return Err(KernelError::PermissionDenied);
        }
        let mut inner = self.inner.lock();
        inner.pcrs[index] = [0u8; PCR_SIZE];
        inner.extend_counts[index] = 0;
        Ok(())
    }

    fn snapshot(&self, pcr_set: &[u8]) -> KernelResult<Vec<PcrValue>> {
        let inner = self.inner.lock();
        pcr_set
            .iter()
            .map(|&idx| {
                inner
                    .pcrs
                    .get(idx as usize)
                    .copied()
                    .ok_or(KernelError::InvalidArgument)
            })
            .collect()
    }

    /// Seals `data` to the PCR values currently held by `pcr_set`.
    pub fn seal(&self, pcr_set: &[u8], data: &[u8]) -> KernelResult<Sealed> {
        let pcr_snapshot = self.snapshot(pcr_set)?;
        let key = Self::derive_key(&pcr_snapshot);
        Ok(Sealed {
            pcr_set: pcr_set.to_vec(),
            ciphertext: xor_with_key(&key, data),
            pcr_snapshot,
        })
    }

    /// Unseals iff every PCR in the sealed set still byte-equals its
    /// value at seal time (spec.md §4.8 "byte-equal").
    pub fn unseal(&self, sealed: &Sealed) -> KernelResult<Vec<u8>> {
        let current = self.snapshot(&sealed.pcr_set)?;
        if current != sealed.pcr_snapshot {
            return Err(KernelError::PcrMismatch);
        }
        let key = Self::derive_key(&sealed.pcr_snapshot);
        Ok(xor_with_key(&key, &sealed.ciphertext))
    }

    fn derive_key(pcr_snapshot: &[PcrValue]) -> PcrValue {
        let mut hasher = Sha256::new();
        for pcr in pcr_snapshot {
            hasher.update(pcr);
        }
        hasher.finalize().into()
    }

    /// Attests `pcr_set` against `nonce`: a signed record binding the
    /// current PCR values to a caller-supplied nonce so a verifier can
    /// detect replay.
    pub fn quote(&self, pcr_set: &[u8], nonce: &[u8]) -> KernelResult<Quote> {
        let pcr_values = self.snapshot(pcr_set)?;
        let mut hasher = Sha256::new();
        for pcr in &pcr_values {
            hasher.update(pcr);
        }
        hasher.update(nonce);
        Ok(Quote {
            pcr_set: pcr_set.to_vec(),
            pcr_values,
            nonce: nonce.to_vec(),
            signature: hasher.finalize().into(),
        })
    }
}

impl Default for Tpm {
    fn default() -> Self {
        Self::new()
    }
}

/// The system's single TPM instance.
pub static TPM: Tpm = Tpm::new();

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn extend_is_hash_of_previous_concat_data() {
        let tpm = Tpm::new();
        tpm.extend(7, b"boot_measurement").unwrap();
        let expected = hash_concat(&[&[0u8; PCR_SIZE], b"boot_measurement"]);
        assert_eq!(tpm.read(7).unwrap(), expected);
        assert_eq!(tpm.extend_count(7).unwrap(), 1);
    }

    #[test]
    fn low_pcrs_cannot_be_reset() {
        let tpm = Tpm::new();
        assert_eq!(tpm.reset(0), Err(KernelError::PermissionDenied));
        assert_eq!(tpm.reset(15), Err(KernelError::PermissionDenied));
    }

    #[test]
    fn high_pcrs_reset_to_all_zero() {
        let tpm = Tpm::new();
        tpm.extend(16, b"measurement").unwrap();
        tpm.reset(16).unwrap();
        assert_eq!(tpm.read(16).unwrap(), [0u8; PCR_SIZE]);
        assert_eq!(tpm.extend_count(16).unwrap(), 0);
    }

    #[test]
    fn seal_then_immediate_unseal_round_trips() {
        let tpm = Tpm::new();
        tpm.extend(7, b"boot_measurement").unwrap();
        let sealed = tpm.seal(&[7], b"secret").unwrap();
        assert_eq!(tpm.unseal(&sealed).unwrap(), b"secret");
    }

    #[test]
    fn extending_a_sealed_pcr_breaks_unseal() {
        let tpm = Tpm::new();
        tpm.extend(7, b"boot_measurement").unwrap();
        let sealed = tpm.seal(&[7], b"secret").unwrap();
        tpm.extend(7, b"tampered").unwrap();
        assert_eq!(tpm.unseal(&sealed), Err(KernelError::PcrMismatch));
    }

    #[test]
    fn quote_signature_changes_with_nonce() {
        let tpm = Tpm::new();
        tpm.extend(0, b"bios").unwrap();
        let q1 = tpm.quote(&[0], b"nonce-a").unwrap();
        let q2 = tpm.quote(&[0], b"nonce-b").unwrap();
        assert_ne!(q1.signature, q2.signature);
    }
}
