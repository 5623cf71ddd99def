//! Division-free quotient computation for the encoder hot path.
//!
//! Encoding a symbol of frequency `f` needs `x / f` for a state `x` in
//! `[0, B·L)`. Integer division is slow, so each distinct frequency gets a
//! precomputed `(shift, multiplier)` pair with
//!
//! ```text
//! floor(x * multiplier / 2^shift) == floor(x / f)   for all 0 <= x < 2^N
//! ```
//!
//! where `N` is the dividend width. With `shift = N + ceil(log2 f)` and
//! `multiplier = ceil(2^shift / f)`, the rounding error of the multiplier is
//! below `f`, so the error term `x * (multiplier*f - 2^shift) / (f * 2^shift)`
//! stays below `1/f` and never crosses an integer boundary. The result is
//! exact over the whole range; no correction step is needed.
//!
//! `multiplier < 2^(N+1)`, so with `N <= 63` it fits a `u64`, and the
//! product is formed in `u128`.

use crate::config::CoderConfig;
use crate::error::{Error, Result};
use crate::model::FrequencyTable;

/// Reciprocal parameters for one divisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FastDivider {
    divisor: u32,
    shift: u32,
    multiplier: u64,
    dividend_bits: u32,
}

impl FastDivider {
    /// Derive the reciprocal for `divisor` over dividends below `2^dividend_bits`.
    ///
    /// # Errors
    /// `Error::Configuration` if the divisor is zero or the dividend width
    /// exceeds 63 bits; `Error::DividerMismatch` if the derived pair fails the
    /// construction-time spot check.
    pub fn new(divisor: u32, dividend_bits: u32) -> Result<Self> {
        if divisor == 0 {
            return Err(Error::Configuration("divisor must be nonzero".into()));
        }
        if dividend_bits == 0 || dividend_bits > 63 {
            return Err(Error::Configuration(format!(
                "dividend width must be between 1 and 63 bits, got {dividend_bits}"
            )));
        }

        let shift = dividend_bits + ceil_log2(divisor);
        let d = divisor as u128;
        let multiplier = ((1u128 << shift) + d - 1) / d;

        let divider = Self {
            divisor,
            shift,
            multiplier: multiplier as u64,
            dividend_bits,
        };
        divider.verify(divider.edge_dividends())?;
        Ok(divider)
    }

    /// Reciprocal for `divisor` under the dividend range of `config`.
    pub fn for_config(divisor: u32, config: &CoderConfig) -> Result<Self> {
        Self::new(divisor, config.dividend_bits())
    }

    /// Divisor this reciprocal stands in for.
    #[inline]
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Right shift applied to the product.
    #[inline]
    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Multiplier `ceil(2^shift / divisor)`.
    #[inline]
    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    /// `floor(x / divisor)` for `x < 2^dividend_bits`.
    #[inline(always)]
    pub fn divide(&self, x: u64) -> u64 {
        debug_assert!(x >> self.dividend_bits == 0, "dividend {x} out of range");
        ((x as u128 * self.multiplier as u128) >> self.shift) as u64
    }

    /// Quotient and remainder, `(x / divisor, x % divisor)`.
    #[inline(always)]
    pub fn div_rem(&self, x: u64) -> (u64, u64) {
        let q = self.divide(x);
        (q, x - q * self.divisor as u64)
    }

    /// Compare against true division for every dividend in `dividends`.
    pub fn verify<I: IntoIterator<Item = u64>>(&self, dividends: I) -> Result<()> {
        for x in dividends {
            let fast = self.divide(x);
            let exact = x / self.divisor as u64;
            if fast != exact {
                return Err(Error::DividerMismatch {
                    dividend: x,
                    divisor: self.divisor,
                    fast,
                    exact,
                });
            }
        }
        Ok(())
    }

    /// Dividends next to quotient boundaries at both ends of the range.
    fn edge_dividends(&self) -> impl Iterator<Item = u64> {
        let max = (1u64 << self.dividend_bits) - 1;
        let f = self.divisor as u64;
        let top = max - max % f;
        [
            0,
            f.min(max),
            f - 1,
            top,
            top.saturating_sub(1),
            max,
        ]
        .into_iter()
        .filter(move |&x| x <= max)
    }
}

/// `ceil(log2(x))` for `x >= 1`.
#[inline]
fn ceil_log2(x: u32) -> u32 {
    u32::BITS - (x - 1).leading_zeros()
}

/// Reciprocals for every symbol of a frequency table.
///
/// Built once per table and shared read-only by any number of encoders.
/// Zero-frequency symbols have no entry.
#[derive(Clone, Debug)]
pub struct DividerTable {
    dividers: Vec<Option<FastDivider>>,
}

impl DividerTable {
    /// Derive reciprocals for all symbols of `table` under `config`.
    pub fn new(table: &FrequencyTable, config: &CoderConfig) -> Result<Self> {
        let mut dividers: Vec<Option<FastDivider>> = vec![None; 256];
        // Many symbols share a frequency; derive each divisor once.
        let mut by_frequency: Vec<(u32, FastDivider)> = Vec::new();
        for (symbol, slot) in dividers.iter_mut().enumerate() {
            let freq = table.frequency(symbol as u8);
            if freq == 0 {
                continue;
            }
            let divider = match by_frequency.iter().find(|(f, _)| *f == freq) {
                Some(&(_, divider)) => divider,
                None => {
                    let divider = FastDivider::for_config(freq, config)?;
                    by_frequency.push((freq, divider));
                    divider
                }
            };
            *slot = Some(divider);
        }
        log::trace!(
            "derived {} distinct reciprocals for {} symbols",
            by_frequency.len(),
            table.alphabet_size()
        );
        Ok(Self { dividers })
    }

    /// Reciprocal for `symbol`, or `None` if its frequency is zero.
    #[inline(always)]
    pub fn get(&self, symbol: u8) -> Option<&FastDivider> {
        self.dividers[symbol as usize].as_ref()
    }
}
