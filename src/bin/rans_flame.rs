use static_rans::{ChunkInput, ChunkedCorpus, CoderConfig, RansCodec, SymbolCounts};

fn main() -> static_rans::Result<()> {
    let config = CoderConfig::from_env()?;
    let input: Vec<u8> = (0..100_000u32)
        .map(|i| b"etaoin shrdlu"[(i.wrapping_mul(2_654_435_761) >> 28) as usize % 13])
        .collect();
    let counts = SymbolCounts::from_samples([&input]);
    let codec = RansCodec::from_probabilities(config, &counts.probabilities())?;
    let inputs: Vec<ChunkInput<'_>> = input
        .chunks(1000)
        .enumerate()
        .map(|(i, symbols)| ChunkInput::with_bonus(symbols, i as u64))
        .collect();

    let mut total = 0usize;
    for _ in 0..200 {
        let stack = codec.encode(&input, 0)?;
        let (decoded, _) = codec.decode(&stack)?;
        assert_eq!(decoded.len(), input.len());

        let corpus = ChunkedCorpus::encode(&codec, &inputs)?;
        total += corpus.decode_all(&codec)?.len();
    }
    println!(
        "m_bits={} l_bits={} chunks decoded: {total}",
        config.m_bits, config.l_bits
    );
    Ok(())
}
