//! # Static rANS
//!
//! *A byte-oriented range asymmetric numeral system coder with a fixed,
//! precomputed probability table.*
//!
//! ## Intuition First
//!
//! Think of the coder state as a number written in a mixed radix. Encoding a
//! symbol appends a "digit" whose width depends on how likely the symbol is:
//! a common symbol grows the number by a little, a rare one by a lot. When
//! the number grows too large, its low byte is pushed out onto a stack; when
//! the decoder shrinks it too far, it pulls that byte back. The number never
//! leaves a fixed window, so a single machine word carries the whole stream.
//!
//! ## The Problem
//!
//! A large, static corpus (a dictionary of words, say) has a very stable byte
//! distribution. One table built from the whole corpus is good for every
//! part of it, so there is no need to adapt per chunk:
//! - the table is stored once and shared by every chunk;
//! - each chunk is a short, independent stream, so one lookup decodes only
//!   one chunk;
//! - a small integer per chunk can be hidden in the stream's initial state at
//!   no cost in output bytes.
//!
//! ## Mathematical Formulation
//!
//! With table total `M = 2^m_bits`, symbol frequency `f_s` and slot start
//! `c_s`, the encoder and decoder maps are
//!
//! ```text
//! C(x, s) = floor(x / f_s) * M + c_s + (x mod f_s)
//! D(x)    = (s, f_s * floor(x / M) + (x mod M) - c_s)   where c_s <= x mod M < c_{s+1}
//! ```
//!
//! The state is kept in `[L, 256·L)` by moving whole bytes, `L = 2^l_bits`.
//!
//! ## Components
//!
//! - [`model`]: [`FrequencyModel`] discretizes probabilities into a
//!   [`FrequencyTable`] with total exactly `M`, minimising expected code
//!   length.
//! - [`divider`]: [`FastDivider`] replaces `x / f_s` with an exact
//!   multiply-and-shift.
//! - [`rans`]: [`Encoder`] and [`Decoder`] state machines, bundled with their
//!   table by [`RansCodec`].
//! - [`chunk`]: serialized chunks and parallel coding of many independent
//!   streams.
//! - [`config`]: the `(l_bits, m_bits)` pair every stream is coded with.
//!
//! ## Example
//!
//! ```rust
//! use static_rans::{CoderConfig, RansCodec, SymbolCounts};
//!
//! # fn main() -> static_rans::Result<()> {
//! let counts = SymbolCounts::from_samples(["hello world!"]);
//! let codec = RansCodec::from_probabilities(CoderConfig::default(), &counts.probabilities())?;
//!
//! let stack = codec.encode(b"hello world!", 0)?;
//! let (symbols, bonus) = codec.decode(&stack)?;
//! assert_eq!(symbols, b"hello world!");
//! assert_eq!(bonus, 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Modes
//!
//! 1. **Unseen symbols**: a symbol with probability 0 gets no slots and
//!    cannot be encoded.
//! 2. **Dominant first symbol**: a stream seeded below `L` cannot start with
//!    a symbol owning most of the table; see [`Error::InitialStateTooSmall`].
//! 3. **No length field**: the stream ends where its bytes run out. Callers
//!    that know the symbol count should check it with
//!    [`Decoder::decode_exact`].
//!
//! ## References
//!
//! - Duda, J. (2013). "Asymmetric numeral systems: entropy coding combining speed of Huffman coding with compression rate of arithmetic coding."
//! - Giesen, F. (2014). "rANS notes" and the ryg_rans byte-wise coder.
//! - Granlund, T., Montgomery, P. (1994). "Division by invariant integers using multiplication."

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod config;
pub mod divider;
pub mod error;
pub mod model;
pub mod rans;

pub use chunk::{ChunkInput, ChunkedCorpus, CompressedChunk};
pub use config::CoderConfig;
pub use divider::{DividerTable, FastDivider};
pub use error::{Error, Result};
pub use model::{FrequencyModel, FrequencyTable, SymbolCounts};
pub use rans::{Decoded, Decoder, Encoder, RansCodec};
