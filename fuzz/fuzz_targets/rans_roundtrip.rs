#![no_main]
use libfuzzer_sys::fuzz_target;
use static_rans::{CoderConfig, Error, RansCodec, SymbolCounts};

fuzz_target!(|data: (Vec<u8>, Vec<u8>, u32, u64)| {
    let (model_bytes, input, m_bits, bonus) = data;
    if model_bytes.is_empty() {
        return;
    }
    let m_bits = (m_bits % 17) + 8; // 8 to 24 bits
    let config = match CoderConfig::new(32, m_bits) {
        Ok(config) => config,
        Err(_) => return,
    };

    let counts = SymbolCounts::from_samples([&model_bytes]);
    let codec = match RansCodec::from_probabilities(config, &counts.probabilities()) {
        Ok(codec) => codec,
        Err(_) => return,
    };
    let bonus = bonus % config.bonus_limit();

    // Keep only symbols the model knows about.
    let input: Vec<u8> = input
        .into_iter()
        .filter(|&b| codec.table().frequency(b) > 0)
        .collect();

    let stack = match codec.encode(&input, bonus) {
        Ok(stack) => stack,
        Err(Error::InitialStateTooSmall { .. }) => return,
        Err(e) => panic!("unexpected encode error: {e}"),
    };
    let (output, recovered) = codec.decode(&stack).unwrap();
    assert_eq!(input, output);
    assert_eq!(bonus, recovered);

    // Arbitrary bytes must never panic the decoder.
    let _ = codec.decode(&input);
});
