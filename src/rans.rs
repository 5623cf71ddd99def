//! Byte-oriented static rANS.
//!
//! The coder keeps one integer register `x` in `[L, B·L)`. Encoding symbol
//! `s` with frequency `f_s` and slot start `c_s` maps
//!
//! ```text
//! x  ->  (x / f_s) * M + c_s + (x mod f_s)
//! ```
//!
//! and decoding inverts it from the low `m_bits` of the state. Bytes leave
//! the encoder from the low end of the register when it would otherwise
//! overflow, and re-enter the decoder in the opposite order, so the byte
//! buffer behaves as a stack: symbols are encoded back to front and decoded
//! front to back.
//!
//! The register is seeded with `2^(l_bits-1) + bonus`, below `L`. The
//! decoder recognises the end of a stream by arriving at a state below `L`
//! with no bytes left, and returns whatever sits above `2^(l_bits-1)` as the
//! bonus value: an auxiliary integer stored for free.

use crate::config::{CoderConfig, IO_BITS};
use crate::divider::DividerTable;
use crate::error::{Error, Result};
use crate::model::{FrequencyModel, FrequencyTable};

/// A frequency table bound to coder parameters, with its reciprocals.
///
/// Immutable and `Sync`; share one instance between any number of
/// encoders and decoders.
#[derive(Clone, Debug)]
pub struct RansCodec {
    config: CoderConfig,
    table: FrequencyTable,
    dividers: DividerTable,
}

impl RansCodec {
    /// Bind `table` to `config`.
    ///
    /// # Errors
    /// `Error::Configuration` if the config is invalid or the table total
    /// does not match `m_bits`.
    pub fn new(config: CoderConfig, table: FrequencyTable) -> Result<Self> {
        config.validate()?;
        if table.m_bits() != config.m_bits {
            return Err(Error::Configuration(format!(
                "table has m_bits {}, coder expects {}",
                table.m_bits(),
                config.m_bits
            )));
        }
        let dividers = DividerTable::new(&table, &config)?;
        Ok(Self {
            config,
            table,
            dividers,
        })
    }

    /// Build the table from a probability estimate and bind it.
    pub fn from_probabilities(config: CoderConfig, probabilities: &[f64]) -> Result<Self> {
        let table = FrequencyModel::for_config(&config)?.build(probabilities)?;
        Self::new(config, table)
    }

    /// Coder parameters.
    pub fn config(&self) -> &CoderConfig {
        &self.config
    }

    /// The shared frequency table.
    pub fn table(&self) -> &FrequencyTable {
        &self.table
    }

    /// Encoder seeded with bonus 0.
    pub fn encoder(&self) -> Encoder<'_> {
        Encoder {
            codec: self,
            state: self.config.bonus_limit(),
            output: Vec::new(),
        }
    }

    /// Encoder carrying `bonus` in its initial state.
    pub fn encoder_with_bonus(&self, bonus: u64) -> Result<Encoder<'_>> {
        let limit = self.config.bonus_limit();
        if bonus >= limit {
            return Err(Error::InvalidBonus { bonus, limit });
        }
        Ok(Encoder {
            codec: self,
            state: limit + bonus,
            output: Vec::new(),
        })
    }

    /// Decoder over a stack whose terminal state is stored separately.
    pub fn decoder<'a>(&'a self, stack: &'a [u8], state: u64) -> Result<Decoder<'a>> {
        if state >= self.config.upper_bound() {
            return Err(Error::CorruptStream(format!(
                "terminal state {state:#x} exceeds the register range"
            )));
        }
        Ok(Decoder {
            codec: self,
            state,
            stack,
            top: stack.len(),
            decoded: 0,
        })
    }

    /// Decoder over a stack produced by [`Encoder::finish`], which carries
    /// the terminal state on top.
    pub fn decoder_flushed<'a>(&'a self, stack: &'a [u8]) -> Decoder<'a> {
        Decoder {
            codec: self,
            state: 0,
            stack,
            top: stack.len(),
            decoded: 0,
        }
    }

    /// Encode `symbols` with `bonus` into a self-contained byte stack.
    pub fn encode(&self, symbols: &[u8], bonus: u64) -> Result<Vec<u8>> {
        let mut encoder = self.encoder_with_bonus(bonus)?;
        encoder.encode_sequence(symbols)?;
        Ok(encoder.finish())
    }

    /// Decode a stack produced by [`RansCodec::encode`].
    ///
    /// Returns the symbols in their original order and the bonus.
    pub fn decode(&self, stack: &[u8]) -> Result<(Vec<u8>, u64)> {
        self.decoder_flushed(stack).decode_all()
    }
}

/// rANS encoder for one stream.
pub struct Encoder<'a> {
    codec: &'a RansCodec,
    state: u64,
    output: Vec<u8>,
}

impl<'a> Encoder<'a> {
    /// Encode one symbol.
    ///
    /// Symbols must be fed in the reverse of the order they are to be
    /// decoded in; see [`Encoder::encode_sequence`].
    ///
    /// # Errors
    /// - `Error::InvalidSymbol` if `symbol` has frequency 0.
    /// - `Error::InitialStateTooSmall` if this is the first symbol of a
    ///   bonus-seeded stream and its frequency is too large to lift the state
    ///   to `L`. The encoder is left unchanged.
    pub fn encode(&mut self, symbol: u8) -> Result<()> {
        let codec = self.codec;
        let config = &codec.config;
        let divider = codec
            .dividers
            .get(symbol)
            .ok_or(Error::InvalidSymbol(symbol))?;
        let freq = divider.divisor() as u64;

        // Renormalize: after this, x / freq < B·L / M, so the new state stays
        // below B·L.
        let x_max = (freq << (config.l_bits - config.m_bits + IO_BITS)) - 1;
        let mark = self.output.len();
        let mut x = self.state;
        while x > x_max {
            self.output.push(x as u8);
            x >>= IO_BITS;
        }

        let (block, offset) = divider.div_rem(x);
        let next = (block << config.m_bits) + codec.table.cumulative(symbol) as u64 + offset;
        if next < config.lower_bound() {
            self.output.truncate(mark);
            return Err(Error::InitialStateTooSmall { symbol });
        }
        debug_assert!(next < config.upper_bound());
        self.state = next;
        Ok(())
    }

    /// Encode `symbols` so that decoding yields them in the given order.
    pub fn encode_sequence(&mut self, symbols: &[u8]) -> Result<()> {
        for &symbol in symbols.iter().rev() {
            self.encode(symbol)?;
        }
        Ok(())
    }

    /// Current register value.
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Bytes pushed so far, excluding the final flush.
    pub fn bytes_written(&self) -> usize {
        self.output.len()
    }

    /// Flush the terminal state onto the stack and return it.
    ///
    /// Decode the result with [`RansCodec::decoder_flushed`].
    pub fn finish(self) -> Vec<u8> {
        let (mut output, mut state) = self.finish_split();
        while state > 0 {
            output.push(state as u8);
            state >>= IO_BITS;
        }
        output
    }

    /// Return the stack and the terminal state separately.
    ///
    /// Decode the result with [`RansCodec::decoder`].
    pub fn finish_split(self) -> (Vec<u8>, u64) {
        (self.output, self.state)
    }
}

/// One step of a [`Decoder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// The next symbol in original order.
    Symbol(u8),
    /// The stream is exhausted; `bonus` is the value the encoder was seeded with.
    End {
        /// Auxiliary value recovered from the terminal state.
        bonus: u64,
    },
}

/// rANS decoder for one stream.
///
/// Reads the stack from its end towards its start.
pub struct Decoder<'a> {
    codec: &'a RansCodec,
    state: u64,
    stack: &'a [u8],
    top: usize,
    decoded: usize,
}

impl<'a> Decoder<'a> {
    /// Decode the next symbol, or report the end of the stream.
    ///
    /// # Errors
    /// `Error::CorruptStream` if the state cannot have come from the encoder.
    pub fn decode(&mut self) -> Result<Decoded> {
        let codec = self.codec;
        let config = &codec.config;
        let lower = config.lower_bound();

        while self.state < lower && self.top > 0 {
            self.top -= 1;
            self.state = (self.state << IO_BITS) | self.stack[self.top] as u64;
        }

        if self.state < lower {
            let bonus = self
                .state
                .checked_sub(config.bonus_limit())
                .ok_or_else(|| {
                    Error::CorruptStream(format!(
                        "terminal state {:#x} is below the seed range",
                        self.state
                    ))
                })?;
            return Ok(Decoded::End { bonus });
        }

        let table = &codec.table;
        let slot = (self.state & (table.total() as u64 - 1)) as u32;
        let symbol = table.symbol_for(slot);
        let freq = table.frequency(symbol);
        if freq == table.total() {
            // Encoding such a symbol from a valid state never succeeds.
            return Err(Error::CorruptStream(format!(
                "symbol {symbol} owns the whole table"
            )));
        }
        let block = self.state >> config.m_bits;
        self.state = block * freq as u64 + (slot - table.cumulative(symbol)) as u64;
        self.decoded += 1;
        Ok(Decoded::Symbol(symbol))
    }

    /// Decode exactly `n` symbols.
    ///
    /// # Errors
    /// `Error::StreamUnderflow` if the stream ends first.
    pub fn decode_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.decode()? {
                Decoded::Symbol(symbol) => out.push(symbol),
                Decoded::End { .. } => {
                    return Err(Error::StreamUnderflow {
                        expected: n,
                        decoded: out.len(),
                    })
                }
            }
        }
        Ok(out)
    }

    /// Confirm the stream is exhausted and return its bonus.
    ///
    /// # Errors
    /// `Error::TrailingData` if symbols remain.
    pub fn finish(mut self) -> Result<u64> {
        match self.decode()? {
            Decoded::End { bonus } => Ok(bonus),
            Decoded::Symbol(_) => Err(Error::TrailingData),
        }
    }

    /// Decode every remaining symbol and the bonus.
    pub fn decode_all(mut self) -> Result<(Vec<u8>, u64)> {
        let mut out = Vec::new();
        loop {
            match self.decode()? {
                Decoded::Symbol(symbol) => out.push(symbol),
                Decoded::End { bonus } => return Ok((out, bonus)),
            }
        }
    }

    /// Current register value.
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Symbols decoded so far.
    pub fn decoded(&self) -> usize {
        self.decoded
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.top
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SymbolCounts;
    use proptest::prelude::*;

    fn toy_codec(config: CoderConfig) -> RansCodec {
        let counts = SymbolCounts::from_samples([b"hello world!".as_slice()]);
        RansCodec::from_probabilities(config, &counts.probabilities()).unwrap()
    }

    fn three_symbol_codec() -> RansCodec {
        let table = FrequencyTable::from_frequencies(&[128, 64, 64], 8).unwrap();
        RansCodec::new(CoderConfig::new(16, 8).unwrap(), table).unwrap()
    }

    #[test]
    fn test_hello_world_round_trip() {
        let codec = toy_codec(CoderConfig::default());
        let stack = codec.encode(b"hello world!", 0).unwrap();
        let (decoded, bonus) = codec.decode(&stack).unwrap();
        assert_eq!(decoded, b"hello world!");
        assert_eq!(bonus, 0);
    }

    #[test]
    fn test_empty_sequence_returns_bonus() {
        let codec = toy_codec(CoderConfig::default());
        let stack = codec.encode(&[], 12345).unwrap();
        // Only the flushed seed.
        assert_eq!(stack.len(), 3);
        let mut decoder = codec.decoder_flushed(&stack);
        assert_eq!(decoder.decode().unwrap(), Decoded::End { bonus: 12345 });
        assert_eq!(decoder.decoded(), 0);
    }

    #[test]
    fn test_split_finish_round_trip() {
        let codec = toy_codec(CoderConfig::default());
        let mut encoder = codec.encoder_with_bonus(7).unwrap();
        encoder.encode_sequence(b"world hello").unwrap();
        let (stack, state) = encoder.finish_split();
        let mut decoder = codec.decoder(&stack, state).unwrap();
        assert_eq!(decoder.decode_exact(11).unwrap(), b"world hello");
        assert_eq!(decoder.finish().unwrap(), 7);
    }

    #[test]
    fn test_state_stays_in_range() {
        let codec = toy_codec(CoderConfig::default());
        let config = *codec.config();
        let mut encoder = codec.encoder_with_bonus(config.bonus_limit() - 1).unwrap();
        for &symbol in b"dlrow olleh dlrow olleh".iter() {
            encoder.encode(symbol).unwrap();
            assert!(encoder.state() >= config.lower_bound());
            assert!(encoder.state() < config.upper_bound());
        }
    }

    #[test]
    fn test_invalid_symbol() {
        let codec = toy_codec(CoderConfig::default());
        let mut encoder = codec.encoder();
        assert!(matches!(encoder.encode(b'z'), Err(Error::InvalidSymbol(b'z'))));
        assert!(codec.encode(b"hello, world", 0).is_err());
    }

    #[test]
    fn test_invalid_bonus() {
        let codec = toy_codec(CoderConfig::default());
        let limit = codec.config().bonus_limit();
        assert!(codec.encoder_with_bonus(limit - 1).is_ok());
        assert!(matches!(
            codec.encoder_with_bonus(limit),
            Err(Error::InvalidBonus { .. })
        ));
    }

    #[test]
    fn test_underflow_and_trailing_data() {
        let codec = toy_codec(CoderConfig::default());
        let stack = codec.encode(b"hello", 3).unwrap();

        let mut decoder = codec.decoder_flushed(&stack);
        let err = decoder.decode_exact(6).unwrap_err();
        assert!(matches!(
            err,
            Error::StreamUnderflow {
                expected: 6,
                decoded: 5
            }
        ));

        let mut decoder = codec.decoder_flushed(&stack);
        assert_eq!(decoder.decode_exact(4).unwrap(), b"hell");
        assert!(matches!(decoder.finish(), Err(Error::TrailingData)));
    }

    #[test]
    fn test_end_is_sticky() {
        let codec = three_symbol_codec();
        let stack = codec.encode(&[0, 1, 2], 9).unwrap();
        let mut decoder = codec.decoder_flushed(&stack);
        assert_eq!(decoder.decode_exact(3).unwrap(), vec![0, 1, 2]);
        assert_eq!(decoder.decode().unwrap(), Decoded::End { bonus: 9 });
        assert_eq!(decoder.decode().unwrap(), Decoded::End { bonus: 9 });
        assert_eq!(decoder.remaining(), 0);
    }

    #[test]
    fn test_dominant_first_symbol_is_rejected() {
        // 'a' owns 7/8 of the table; from the bonus seed it cannot reach L.
        let table = FrequencyTable::from_frequencies(&[224, 32], 8).unwrap();
        let codec = RansCodec::new(CoderConfig::new(16, 8).unwrap(), table).unwrap();
        let mut encoder = codec.encoder();
        assert!(matches!(
            encoder.encode(0),
            Err(Error::InitialStateTooSmall { symbol: 0 })
        ));
        assert_eq!(encoder.state(), codec.config().bonus_limit());
        // A rarer symbol first lifts the state, after which anything goes.
        encoder.encode(1).unwrap();
        encoder.encode(0).unwrap();
        let stack = encoder.finish();
        assert_eq!(codec.decode(&stack).unwrap(), (vec![0, 1], 0));
    }

    #[test]
    fn test_corrupt_streams_are_reported() {
        let codec = three_symbol_codec();
        assert!(codec.decoder(&[], codec.config().upper_bound()).is_err());
        // An empty flushed stack decodes to state 0, below the seed range.
        assert!(matches!(codec.decode(&[]), Err(Error::CorruptStream(_))));
    }

    #[test]
    fn test_mismatched_table_size() {
        let table = FrequencyTable::from_frequencies(&[128, 128], 8).unwrap();
        assert!(RansCodec::new(CoderConfig::default(), table).is_err());
    }

    #[test]
    fn test_small_table_equal_to_floor() {
        // M == L: renormalization may push several bytes per symbol.
        let config = CoderConfig::new(8, 8).unwrap();
        let codec = RansCodec::from_probabilities(config, &[0.97, 0.01, 0.01, 0.01]).unwrap();
        let input = [1u8, 0, 0, 0, 0, 0, 3, 2, 0, 0, 1, 0, 0, 0, 0, 0, 0, 3];
        let stack = codec.encode(&input, 100).unwrap();
        assert_eq!(codec.decode(&stack).unwrap(), (input.to_vec(), 100));
    }

    #[test]
    fn test_skewed_source_compresses() {
        let codec = RansCodec::from_probabilities(CoderConfig::default(), &[0.9, 0.1]).unwrap();
        let input: Vec<u8> = (0..10_000).map(|i| u8::from(i % 10 == 9)).collect();
        let stack = codec.encode(&input, 0).unwrap();
        // H(0.9, 0.1) ≈ 0.469 bits/symbol.
        assert!(stack.len() < 10_000 * 48 / 100 / 8 + 16, "{} bytes", stack.len());
        assert_eq!(codec.decode(&stack).unwrap().0, input);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_rans_round_trip_with_bonus(
            weights in prop::collection::vec(1u32..500, 2..20),
            picks in prop::collection::vec(any::<prop::sample::Index>(), 0..200),
            bonus_seed in any::<u64>(),
        ) {
            let probs: Vec<f64> = weights.iter().map(|&w| w as f64).collect();
            let codec = RansCodec::from_probabilities(CoderConfig::default(), &probs).unwrap();
            let input: Vec<u8> = picks.iter().map(|i| i.index(weights.len()) as u8).collect();
            let bonus = bonus_seed % codec.config().bonus_limit();

            let mut encoder = codec.encoder_with_bonus(bonus).unwrap();
            match encoder.encode_sequence(&input) {
                Err(Error::InitialStateTooSmall { .. }) => return Ok(()),
                other => other.unwrap(),
            }
            let stack = encoder.finish();
            let (output, recovered) = codec.decode(&stack).unwrap();
            prop_assert_eq!(output, input);
            prop_assert_eq!(recovered, bonus);
        }
    }
}
