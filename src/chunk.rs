//! Independently decodable chunks.
//!
//! A corpus is split (elsewhere) into chunks so a lookup only has to decode
//! one of them. Every chunk is its own rANS stream with its own state, so
//! chunks can be encoded and decoded in any order and in parallel, all
//! sharing one read-only [`RansCodec`].
//!
//! On disk a chunk is its byte stack in push order followed by the terminal
//! state as a fixed-width little-endian integer of
//! [`CoderConfig::state_bytes`] bytes.

use crate::config::CoderConfig;
use crate::error::{Error, Result};
use crate::rans::RansCodec;
use rayon::prelude::*;

/// Symbols of one chunk plus the auxiliary value stored with them.
#[derive(Clone, Copy, Debug)]
pub struct ChunkInput<'a> {
    /// Symbols in the order they should be decoded.
    pub symbols: &'a [u8],
    /// Bonus value embedded in the chunk's initial state.
    pub bonus: u64,
}

impl<'a> ChunkInput<'a> {
    /// Chunk with bonus 0.
    pub fn new(symbols: &'a [u8]) -> Self {
        Self { symbols, bonus: 0 }
    }

    /// Chunk carrying `bonus`.
    pub fn with_bonus(symbols: &'a [u8], bonus: u64) -> Self {
        Self { symbols, bonus }
    }
}

/// One encoded stream with its terminal state kept alongside.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedChunk {
    /// Byte stack in push order; decoding reads it from the end.
    pub payload: Vec<u8>,
    /// Terminal encoder state.
    pub state: u64,
}

impl CompressedChunk {
    /// Encode one chunk.
    pub fn encode(codec: &RansCodec, input: ChunkInput<'_>) -> Result<Self> {
        let mut encoder = codec.encoder_with_bonus(input.bonus)?;
        encoder.encode_sequence(input.symbols)?;
        let (payload, state) = encoder.finish_split();
        log::trace!(
            "chunk: {} symbols -> {} bytes",
            input.symbols.len(),
            payload.len()
        );
        Ok(Self { payload, state })
    }

    /// Decode the chunk, returning its symbols and bonus.
    pub fn decode(&self, codec: &RansCodec) -> Result<(Vec<u8>, u64)> {
        codec.decoder(&self.payload, self.state)?.decode_all()
    }

    /// Size of the serialized chunk.
    pub fn encoded_len(&self, config: &CoderConfig) -> usize {
        self.payload.len() + config.state_bytes()
    }

    /// Serialize as payload followed by the fixed-width state.
    pub fn to_bytes(&self, config: &CoderConfig) -> Vec<u8> {
        let width = config.state_bytes();
        let mut out = Vec::with_capacity(self.payload.len() + width);
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.state.to_le_bytes()[..width]);
        out
    }

    /// Parse bytes written by [`CompressedChunk::to_bytes`].
    pub fn from_bytes(bytes: &[u8], config: &CoderConfig) -> Result<Self> {
        let width = config.state_bytes();
        let split = bytes.len().checked_sub(width).ok_or_else(|| {
            Error::CorruptStream(format!(
                "chunk of {} bytes is shorter than its {width}-byte state",
                bytes.len()
            ))
        })?;
        let (payload, tail) = bytes.split_at(split);
        let mut raw = [0u8; 8];
        raw[..width].copy_from_slice(tail);
        Ok(Self {
            payload: payload.to_vec(),
            state: u64::from_le_bytes(raw),
        })
    }
}

/// An ordered collection of independently encoded chunks.
#[derive(Clone, Debug, Default)]
pub struct ChunkedCorpus {
    chunks: Vec<CompressedChunk>,
}

impl ChunkedCorpus {
    /// Encode every chunk in parallel.
    ///
    /// Fails with the first error in chunk order.
    pub fn encode(codec: &RansCodec, inputs: &[ChunkInput<'_>]) -> Result<Self> {
        let chunks = inputs
            .par_iter()
            .map(|&input| CompressedChunk::encode(codec, input))
            .collect::<Result<Vec<_>>>()?;
        let corpus = Self { chunks };
        log::debug!(
            "encoded {} chunks, {} symbols into {} bytes",
            corpus.len(),
            inputs.iter().map(|c| c.symbols.len()).sum::<usize>(),
            corpus.encoded_len(codec.config())
        );
        Ok(corpus)
    }

    /// Wrap already encoded chunks.
    pub fn from_chunks(chunks: Vec<CompressedChunk>) -> Self {
        Self { chunks }
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True if there are no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Borrow one chunk.
    pub fn get(&self, index: usize) -> Option<&CompressedChunk> {
        self.chunks.get(index)
    }

    /// All chunks in order.
    pub fn chunks(&self) -> &[CompressedChunk] {
        &self.chunks
    }

    /// Decode a single chunk.
    pub fn decode_chunk(&self, codec: &RansCodec, index: usize) -> Result<(Vec<u8>, u64)> {
        let chunk = self.chunks.get(index).ok_or_else(|| {
            Error::CorruptStream(format!(
                "chunk {index} out of range ({} chunks)",
                self.chunks.len()
            ))
        })?;
        chunk.decode(codec)
    }

    /// Decode every chunk in parallel.
    pub fn decode_all(&self, codec: &RansCodec) -> Result<Vec<(Vec<u8>, u64)>> {
        self.chunks
            .par_iter()
            .map(|chunk| chunk.decode(codec))
            .collect()
    }

    /// Total serialized size.
    pub fn encoded_len(&self, config: &CoderConfig) -> usize {
        self.chunks.iter().map(|c| c.encoded_len(config)).sum()
    }
}
