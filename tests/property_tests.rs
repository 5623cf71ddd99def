use proptest::prelude::*;
use static_rans::{CoderConfig, Decoded, Error, FastDivider, FrequencyModel, RansCodec};

fn config_strategy() -> impl Strategy<Value = CoderConfig> {
    prop_oneof![
        Just(CoderConfig::default()),
        Just(CoderConfig::compact()),
        Just(CoderConfig::precise()),
        Just(CoderConfig::new(12, 8).unwrap()),
    ]
}

proptest! {
    #[test]
    fn test_rans_roundtrip(
        config in config_strategy(),
        weights in prop::collection::vec(0u32..1000, 1..=256),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..300),
        bonus_seed in any::<u64>(),
    ) {
        let probable: Vec<u8> = weights
            .iter()
            .enumerate()
            .filter(|(_, &w)| w > 0)
            .map(|(s, _)| s as u8)
            .collect();
        prop_assume!(!probable.is_empty());
        prop_assume!(probable.len() <= config.total() as usize);

        let probs: Vec<f64> = weights.iter().map(|&w| w as f64).collect();
        let codec = RansCodec::from_probabilities(config, &probs).unwrap();
        let input: Vec<u8> = picks.iter().map(|i| probable[i.index(probable.len())]).collect();
        let bonus = bonus_seed % config.bonus_limit();

        let stack = match codec.encode(&input, bonus) {
            Err(Error::InitialStateTooSmall { .. }) => return Ok(()),
            other => other.unwrap(),
        };
        let mut decoder = codec.decoder_flushed(&stack);
        prop_assert_eq!(decoder.decode_exact(input.len()).unwrap(), input);
        prop_assert_eq!(decoder.finish().unwrap(), bonus);
    }

    #[test]
    fn test_state_bounds_hold_after_every_step(
        weights in prop::collection::vec(1u32..1000, 2..64),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..200),
    ) {
        let config = CoderConfig::default();
        let probs: Vec<f64> = weights.iter().map(|&w| w as f64).collect();
        let codec = RansCodec::from_probabilities(config, &probs).unwrap();
        // Seed at the top of the bonus range so any first symbol lifts the state.
        let mut encoder = codec.encoder_with_bonus(config.bonus_limit() - 1).unwrap();
        for i in picks {
            let symbol = i.index(weights.len()) as u8;
            match encoder.encode(symbol) {
                Err(Error::InitialStateTooSmall { .. }) => return Ok(()),
                other => other.unwrap(),
            }
            prop_assert!(encoder.state() >= config.lower_bound());
            prop_assert!(encoder.state() < config.upper_bound());
        }
    }

    #[test]
    fn test_frequency_sum_invariant(
        weights in prop::collection::vec(prop_oneof![Just(0.0f64), 1e-9f64..1.0], 1..=256),
        m_bits in 8u32..=24,
    ) {
        prop_assume!(weights.iter().any(|&w| w > 0.0));
        let table = FrequencyModel::new(m_bits).unwrap().build(&weights).unwrap();
        prop_assert_eq!(table.frequencies().map(u64::from).sum::<u64>(), 1u64 << m_bits);
        for (s, &w) in weights.iter().enumerate() {
            if w > 0.0 {
                prop_assert!(table.frequency(s as u8) >= 1);
            }
        }
    }

    #[test]
    fn test_fast_division_exact_at_default_width(
        f in 1u32..=(1 << 16),
        x in 0u64..(1u64 << 32),
    ) {
        let divider = FastDivider::for_config(f, &CoderConfig::default()).unwrap();
        prop_assert_eq!(divider.divide(x), x / f as u64);
    }
}

#[test]
fn test_hello_world_scenario() {
    // Toy distribution over the bytes of the message itself.
    let mut weights = vec![0.0; 256];
    for (byte, weight) in [
        (b'h', 1.0),
        (b'e', 1.0),
        (b'l', 3.0),
        (b'o', 2.0),
        (b' ', 1.0),
        (b'w', 1.0),
        (b'r', 1.0),
        (b'd', 1.0),
        (b'!', 1.0),
    ] {
        weights[byte as usize] = weight;
    }
    let codec = RansCodec::from_probabilities(CoderConfig::default(), &weights).unwrap();

    let mut encoder = codec.encoder_with_bonus(0).unwrap();
    for &byte in b"hello world!".iter().rev() {
        encoder.encode(byte).unwrap();
    }
    let (stack, state) = encoder.finish_split();

    let (symbols, bonus) = codec.decoder(&stack, state).unwrap().decode_all().unwrap();
    assert_eq!(symbols, b"hello world!");
    assert_eq!(bonus, 0);
}

#[test]
fn test_empty_sequence_scenario() {
    let codec = RansCodec::from_probabilities(CoderConfig::default(), &[0.5, 0.5]).unwrap();
    let bonus = 0x12_3456;
    let stack = codec.encode(&[], bonus).unwrap();
    let mut decoder = codec.decoder_flushed(&stack);
    assert_eq!(decoder.decode().unwrap(), Decoded::End { bonus });
}

#[test]
fn test_exhaustive_division_small_register() {
    let config = CoderConfig::new(8, 8).unwrap();
    for f in 1..=config.total() {
        let divider = FastDivider::for_config(f, &config).unwrap();
        divider.verify(0..config.upper_bound()).unwrap();
    }
}
