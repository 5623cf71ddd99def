//! Static symbol model.
//!
//! [`FrequencyModel`] turns a probability estimate over the 256 byte values
//! into a [`FrequencyTable`]: integer frequencies summing to exactly
//! `M = 2^m_bits`, chosen to minimise the expected code length
//!
//! ```text
//! cost = -sum_s p_s * log2(f_s / M)
//! ```
//!
//! Construction has two phases. Each scaled probability `p·M` is first
//! rounded to whichever neighbouring integer costs less; the crossover sits
//! at the geometric mean `sqrt(down·up)`, not at `down + 0.5`. The rounded
//! sum is then pulled to exactly `M` one step at a time, always taking the
//! ±1 move with the smallest marginal cost increase. A move that would take
//! a nonzero-probability symbol to frequency 0 is never taken.
//!
//! Floating point is used for cost comparisons only; the resulting table is
//! exact integer data and the coder never touches a float.

use crate::config::CoderConfig;
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Number of symbols in the alphabet.
pub const ALPHABET_SIZE: usize = 256;

/// Cumulative frequency table with a power-of-two total.
///
/// `cum[0] = 0`, `cum[256] = M`, non-decreasing; symbol `s` owns the slots
/// `[cum[s], cum[s+1])`. Immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrequencyTable {
    cum: Vec<u32>,
    m_bits: u32,
}

impl FrequencyTable {
    /// Build a table from per-symbol frequencies.
    ///
    /// Missing trailing symbols have frequency 0.
    ///
    /// # Errors
    /// `Error::CorruptTable` if there are more than 256 entries or the
    /// frequencies do not sum to `2^m_bits`.
    pub fn from_frequencies(freqs: &[u32], m_bits: u32) -> Result<Self> {
        if freqs.len() > ALPHABET_SIZE {
            return Err(Error::CorruptTable(format!(
                "{} frequencies for an alphabet of {ALPHABET_SIZE}",
                freqs.len()
            )));
        }
        if m_bits > crate::config::MAX_M_BITS {
            return Err(Error::CorruptTable(format!("table exponent {m_bits} too large")));
        }
        let mut cum = Vec::with_capacity(ALPHABET_SIZE + 1);
        let mut acc = 0u64;
        cum.push(0);
        for s in 0..ALPHABET_SIZE {
            acc += freqs.get(s).copied().unwrap_or(0) as u64;
            if acc > u32::MAX as u64 {
                return Err(Error::CorruptTable("frequency sum overflows".into()));
            }
            cum.push(acc as u32);
        }
        if acc != 1u64 << m_bits {
            return Err(Error::CorruptTable(format!(
                "frequencies sum to {acc}, expected {}",
                1u64 << m_bits
            )));
        }
        Ok(Self { cum, m_bits })
    }

    /// Frequency of `symbol`.
    #[inline(always)]
    pub fn frequency(&self, symbol: u8) -> u32 {
        let s = symbol as usize;
        self.cum[s + 1] - self.cum[s]
    }

    /// Start of the slot range owned by `symbol`.
    #[inline(always)]
    pub fn cumulative(&self, symbol: u8) -> u32 {
        self.cum[symbol as usize]
    }

    /// All 257 cumulative entries.
    pub fn cumulative_table(&self) -> &[u32] {
        &self.cum
    }

    /// Per-symbol frequencies.
    pub fn frequencies(&self) -> impl Iterator<Item = u32> + '_ {
        self.cum.windows(2).map(|w| w[1] - w[0])
    }

    /// Table total `M`.
    #[inline]
    pub fn total(&self) -> u32 {
        1 << self.m_bits
    }

    /// Exponent of the table total.
    #[inline]
    pub fn m_bits(&self) -> u32 {
        self.m_bits
    }

    /// Number of symbols with nonzero frequency.
    pub fn alphabet_size(&self) -> usize {
        self.frequencies().filter(|&f| f > 0).count()
    }

    /// The unique symbol `s` with `cum[s] <= slot < cum[s+1]`.
    ///
    /// `slot` must be below `M`.
    #[inline]
    pub fn symbol_for(&self, slot: u32) -> u8 {
        debug_assert!(slot < self.total());
        (self.cum.partition_point(|&c| c <= slot) - 1) as u8
    }

    /// Expected bits per symbol when data distributed as `probabilities` is
    /// coded with this table. Infinite if a probable symbol has no slots.
    pub fn cross_entropy(&self, probabilities: &[f64]) -> f64 {
        let total = self.total() as f64;
        let mass: f64 = probabilities.iter().sum();
        if mass <= 0.0 {
            return 0.0;
        }
        probabilities
            .iter()
            .zip(self.frequencies())
            .filter(|(&p, _)| p > 0.0)
            .map(|(&p, f)| {
                if f == 0 {
                    f64::INFINITY
                } else {
                    -(p / mass) * (f as f64 / total).log2()
                }
            })
            .sum()
    }

    /// Persist as 256 little-endian `u32` frequencies.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ALPHABET_SIZE * 4);
        for f in self.frequencies() {
            out.extend_from_slice(&f.to_le_bytes());
        }
        out
    }

    /// Reload a table written by [`FrequencyTable::to_bytes`].
    ///
    /// The total, and with it `m_bits`, is recovered from the sum.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ALPHABET_SIZE * 4 {
            return Err(Error::CorruptTable(format!(
                "expected {} bytes, got {}",
                ALPHABET_SIZE * 4,
                bytes.len()
            )));
        }
        let freqs: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let sum: u64 = freqs.iter().map(|&f| f as u64).sum();
        if !sum.is_power_of_two() {
            return Err(Error::CorruptTable(format!(
                "frequency sum {sum} is not a power of two"
            )));
        }
        Self::from_frequencies(&freqs, sum.trailing_zeros())
    }
}

/// Byte occurrence counts over a corpus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolCounts {
    counts: [u64; ALPHABET_SIZE],
}

impl Default for SymbolCounts {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolCounts {
    /// Empty counts.
    pub fn new() -> Self {
        Self {
            counts: [0; ALPHABET_SIZE],
        }
    }

    /// Count every byte of every sample.
    pub fn from_samples<I, S>(samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut counts = Self::new();
        for sample in samples {
            counts.add(sample.as_ref());
        }
        counts
    }

    /// Count the bytes of `data`.
    pub fn add(&mut self, data: &[u8]) {
        for &b in data {
            self.counts[b as usize] += 1;
        }
    }

    /// Occurrences of `symbol`.
    pub fn count(&self, symbol: u8) -> u64 {
        self.counts[symbol as usize]
    }

    /// Total number of counted bytes.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Empirical probabilities, all zero if nothing was counted.
    pub fn probabilities(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return vec![0.0; ALPHABET_SIZE];
        }
        self.counts
            .iter()
            .map(|&c| c as f64 / total as f64)
            .collect()
    }
}

/// Builds cost-optimal frequency tables of a fixed total.
#[derive(Clone, Copy, Debug)]
pub struct FrequencyModel {
    m_bits: u32,
}

impl FrequencyModel {
    /// Model producing tables of total `2^m_bits`.
    pub fn new(m_bits: u32) -> Result<Self> {
        if m_bits == 0 || m_bits > crate::config::MAX_M_BITS {
            return Err(Error::Configuration(format!(
                "m_bits must be between 1 and {}, got {m_bits}",
                crate::config::MAX_M_BITS
            )));
        }
        Ok(Self { m_bits })
    }

    /// Model matching the table size of `config`.
    pub fn for_config(config: &CoderConfig) -> Result<Self> {
        Self::new(config.m_bits)
    }

    /// Table total `M`.
    pub fn total(&self) -> u32 {
        1 << self.m_bits
    }

    /// Build a table from empirical counts.
    pub fn build_from_counts(&self, counts: &SymbolCounts) -> Result<FrequencyTable> {
        self.build(&counts.probabilities())
    }

    /// Build a table from a probability estimate per symbol.
    ///
    /// The estimate is renormalised, so it only has to sum to 1 up to
    /// floating point error. Symbols with probability 0 get frequency 0.
    ///
    /// # Errors
    /// - `Error::InvalidProbability` for negative or non-finite entries, or if
    ///   every entry is zero.
    /// - `Error::DegenerateDistribution` if more symbols are probable than the
    ///   table has slots.
    pub fn build(&self, probabilities: &[f64]) -> Result<FrequencyTable> {
        if probabilities.len() > ALPHABET_SIZE {
            return Err(Error::Configuration(format!(
                "{} probabilities for an alphabet of {ALPHABET_SIZE}",
                probabilities.len()
            )));
        }
        if let Some(&bad) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(Error::InvalidProbability(bad));
        }
        let mass: f64 = probabilities.iter().sum();
        if mass <= 0.0 {
            return Err(Error::InvalidProbability(mass));
        }

        let total = self.total();
        let probs: Vec<f64> = (0..ALPHABET_SIZE)
            .map(|s| probabilities.get(s).map_or(0.0, |&p| p / mass))
            .collect();
        let nonzero = probs.iter().filter(|&&p| p > 0.0).count();
        if nonzero > total as usize {
            return Err(Error::DegenerateDistribution { nonzero, total });
        }

        let mut freqs: Vec<u32> = probs.iter().map(|&p| round_scaled(p, total)).collect();
        let rounded: i64 = freqs.iter().map(|&f| f as i64).sum();
        let correction = total as i64 - rounded;
        log::debug!(
            "frequency model: {nonzero} symbols, total {total}, correction {correction}"
        );

        if correction != 0 {
            refine(&mut freqs, &probs, correction)
                .ok_or(Error::DegenerateDistribution { nonzero, total })?;
        }

        let table = FrequencyTable::from_frequencies(&freqs, self.m_bits)?;
        log::debug!(
            "frequency model: {:.5} bits/symbol",
            table.cross_entropy(&probs)
        );
        Ok(table)
    }
}

/// Round `p·total` to the neighbour with the lower expected code length.
///
/// Choosing `up` over `down` costs `p·log2(up/down)` fewer bits for this
/// symbol; the two are balanced when `scaled² = down·up`.
fn round_scaled(p: f64, total: u32) -> u32 {
    if p == 0.0 {
        return 0;
    }
    let scaled = p * total as f64;
    let down = scaled.floor();
    let up = down + 1.0;
    let chosen = if scaled * scaled >= down * up { up } else { down };
    (chosen as u32).clamp(1, total)
}

/// A pending ±1 move and its marginal cost in bits.
#[derive(Clone, Copy, Debug)]
struct Move {
    cost: f64,
    symbol: usize,
}

impl PartialEq for Move {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Move {}

impl Ord for Move {
    fn cmp(&self, other: &Self) -> Ordering {
        // Cheapest move first; lower symbol wins ties.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.symbol.cmp(&self.symbol))
    }
}

impl PartialOrd for Move {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cost of moving a frequency from `count` to `count + delta`.
///
/// `None` when the move would empty the symbol.
fn move_cost(p: f64, count: u32, delta: i64) -> Option<f64> {
    let next = count as i64 + delta;
    if next <= 0 {
        return None;
    }
    Some(p * (count as f64 / next as f64).log2())
}

/// Apply the cheapest ±1 moves until the frequencies sum to the target.
///
/// `correction` is `target − current sum`. Returns `None` if no legal move
/// remains before the sum is reached.
fn refine(freqs: &mut [u32], probs: &[f64], correction: i64) -> Option<()> {
    let delta = correction.signum();
    let mut heap: BinaryHeap<Move> = probs
        .iter()
        .enumerate()
        .filter(|(_, &p)| p > 0.0)
        .filter_map(|(symbol, &p)| {
            move_cost(p, freqs[symbol], delta).map(|cost| Move { cost, symbol })
        })
        .collect();

    for _ in 0..correction.unsigned_abs() {
        let Move { symbol, .. } = heap.pop()?;
        freqs[symbol] = (freqs[symbol] as i64 + delta) as u32;
        if let Some(cost) = move_cost(probs[symbol], freqs[symbol], delta) {
            heap.push(Move { cost, symbol });
        }
    }
    Some(())
}
