//! Coder parameters.
//!
//! A coder is fully described by two exponents:
//!
//! - `l_bits`: the renormalization floor `L = 2^l_bits`. The state register
//!   lives in `[L, B·L)` with `B = 256`.
//! - `m_bits`: the table total `M = 2^m_bits`. `M` must divide `L`.
//!
//! Encoder, decoder and divider all read their constants from the same
//! [`CoderConfig`], so a stream can only be decoded with the configuration it
//! was encoded with.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Bits moved per renormalization step (`B = 2^IO_BITS`).
pub const IO_BITS: u32 = 8;

/// Largest supported table exponent.
pub const MAX_M_BITS: u32 = 24;

/// Largest supported floor exponent; keeps `B·L` below `2^63`.
pub const MAX_L_BITS: u32 = 63 - IO_BITS;

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "RANS_";

/// Table-size parameters shared by every stream of a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoderConfig {
    /// Exponent of the renormalization floor `L`.
    pub l_bits: u32,
    /// Exponent of the table total `M`.
    pub m_bits: u32,
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self {
            l_bits: 24,
            m_bits: 16,
        }
    }
}

impl CoderConfig {
    /// Create and validate a configuration.
    pub fn new(l_bits: u32, m_bits: u32) -> Result<Self> {
        let config = Self { l_bits, m_bits };
        config.validate()?;
        Ok(config)
    }

    /// Small tables, for tiny alphabets or memory-bound decoders.
    pub fn compact() -> Self {
        Self {
            l_bits: 24,
            m_bits: 12,
        }
    }

    /// High-resolution tables for very skewed distributions.
    pub fn precise() -> Self {
        Self {
            l_bits: 32,
            m_bits: 20,
        }
    }

    /// Check that the parameters describe a usable coder.
    pub fn validate(&self) -> Result<()> {
        if self.m_bits == 0 || self.m_bits > MAX_M_BITS {
            return Err(Error::Configuration(format!(
                "m_bits must be between 1 and {MAX_M_BITS}, got {}",
                self.m_bits
            )));
        }
        if self.l_bits > MAX_L_BITS {
            return Err(Error::Configuration(format!(
                "l_bits must be at most {MAX_L_BITS}, got {}",
                self.l_bits
            )));
        }
        if self.m_bits > self.l_bits {
            return Err(Error::Configuration(format!(
                "m_bits ({}) must not exceed l_bits ({})",
                self.m_bits, self.l_bits
            )));
        }
        Ok(())
    }

    /// Renormalization floor `L`.
    #[inline]
    pub fn lower_bound(&self) -> u64 {
        1 << self.l_bits
    }

    /// Exclusive upper bound `B·L` of the state register.
    #[inline]
    pub fn upper_bound(&self) -> u64 {
        1 << (self.l_bits + IO_BITS)
    }

    /// Table total `M`.
    #[inline]
    pub fn total(&self) -> u32 {
        1 << self.m_bits
    }

    /// Exclusive upper limit for a bonus value.
    #[inline]
    pub fn bonus_limit(&self) -> u64 {
        1 << (self.l_bits - 1)
    }

    /// Bit width of every dividend the encoder divides.
    #[inline]
    pub fn dividend_bits(&self) -> u32 {
        self.l_bits + IO_BITS
    }

    /// Bytes needed to store a terminal state at fixed width.
    #[inline]
    pub fn state_bytes(&self) -> usize {
        self.dividend_bits().div_ceil(8) as usize
    }

    /// Read the configuration from `RANS_L_BITS` / `RANS_M_BITS`.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Read the configuration from `{prefix}L_BITS` / `{prefix}M_BITS`.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            l_bits: parse_env_var(&format!("{prefix}L_BITS"), defaults.l_bits),
            m_bits: parse_env_var(&format!("{prefix}M_BITS"), defaults.m_bits),
        };
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("failed to parse config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Parse an environment variable, falling back to `default`.
fn parse_env_var<T>(var_name: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match env::var(var_name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("ignoring unparsable {var_name}={raw:?}, using {default}");
            default
        }),
        Err(_) => default,
    }
}
