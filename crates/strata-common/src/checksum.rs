//! Checksum utilities for Strata
//!
//! Client-supplied checksums have the form `<algorithm>:<hex digest>`.
//! Backends feed uploaded bytes through a [`ChecksumCalculator`] as they
//! stream and compare the result before committing the file.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{Error, Result};

/// Supported digest algorithms
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Crc32c,
    Xxh64,
    Sha256,
}

impl ChecksumAlgorithm {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Crc32c => "crc32c",
            Self::Xxh64 => "xxh64",
            Self::Sha256 => "sha256",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "crc32c" => Some(Self::Crc32c),
            "xxh64" => Some(Self::Xxh64),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    const fn digest_len(self) -> usize {
        match self {
            Self::Crc32c => 8,
            Self::Xxh64 => 16,
            Self::Sha256 => 64,
        }
    }
}

/// Checksum the caller expects the uploaded content to have
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedChecksum {
    algorithm: ChecksumAlgorithm,
    digest: String,
}

impl ExpectedChecksum {
    /// Parse a client checksum; an empty string means "do not verify".
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let (name, digest) = raw
            .split_once(':')
            .ok_or_else(|| Error::bad_input_data(format!("malformed checksum {raw:?}")))?;
        let algorithm = ChecksumAlgorithm::from_name(name)
            .ok_or_else(|| Error::bad_input_data(format!("unsupported checksum type {name:?}")))?;

        let digest = digest.to_ascii_lowercase();
        if digest.len() != algorithm.digest_len() || hex::decode(&digest).is_err() {
            return Err(Error::bad_input_data(format!(
                "malformed {} digest",
                algorithm.name()
            )));
        }

        Ok(Some(Self { algorithm, digest }))
    }

    #[must_use]
    pub const fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Fresh calculator for this checksum's algorithm
    #[must_use]
    pub fn calculator(&self) -> ChecksumCalculator {
        ChecksumCalculator::new(self.algorithm)
    }

    /// Compare a finished digest, failing with `BadChecksum`
    pub fn verify(&self, actual: &str) -> Result<()> {
        if self.digest == actual {
            Ok(())
        } else {
            Err(Error::bad_checksum(format!(
                "checksum mismatch: expected {self}, got {}:{actual}",
                self.algorithm.name()
            )))
        }
    }
}

impl fmt::Display for ExpectedChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.digest)
    }
}

enum CalculatorState {
    Crc32c(u32),
    Xxh64(Box<xxhash_rust::xxh64::Xxh64>),
    Sha256(Sha256),
}

/// Streaming checksum calculator
pub struct ChecksumCalculator {
    state: CalculatorState,
}

impl ChecksumCalculator {
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        let state = match algorithm {
            ChecksumAlgorithm::Crc32c => CalculatorState::Crc32c(0),
            ChecksumAlgorithm::Xxh64 => {
                CalculatorState::Xxh64(Box::new(xxhash_rust::xxh64::Xxh64::new(0)))
            }
            ChecksumAlgorithm::Sha256 => CalculatorState::Sha256(Sha256::new()),
        };
        Self { state }
    }

    /// Update the calculator with more data
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            CalculatorState::Crc32c(crc) => *crc = crc32c::crc32c_append(*crc, data),
            CalculatorState::Xxh64(state) => state.update(data),
            CalculatorState::Sha256(state) => state.update(data),
        }
    }

    /// Finish and return the lowercase hex digest
    #[must_use]
    pub fn finalize(self) -> String {
        match self.state {
            CalculatorState::Crc32c(crc) => format!("{crc:08x}"),
            CalculatorState::Xxh64(state) => format!("{:016x}", state.digest()),
            CalculatorState::Sha256(state) => hex::encode(state.finalize()),
        }
    }
}

/// One-shot SHA-256 in the `sha256:<hex>` form
#[must_use]
pub fn sha256_checksum(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}
