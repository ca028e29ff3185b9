//! Buffer layout and PCM conversion tests.

use approx::assert_abs_diff_eq;

use kette::buffer::{
    i16_to_sample, i8_to_sample, sample_to_i16, sample_to_i8, sample_to_u16, sample_to_u8,
    split_interleaved, split_sequential, squish_interleaved, squish_sequential, u16_to_sample,
    u8_to_sample, SampleBuffer,
};

fn three_channels() -> SampleBuffer {
    SampleBuffer::from_channels(vec![
        (0..10).map(f64::from).collect(),
        (10..20).map(f64::from).collect(),
        (20..30).map(f64::from).collect(),
    ])
}

#[test]
fn construct() {
    let buff = SampleBuffer::new(440, 2);
    assert_eq!(buff.frames(), 440);
    assert_eq!(buff.channel_count(), 2);
    assert_eq!(buff.total_samples(), 880);
    assert!(buff.iter_sequential().all(|&s| s == 0.0));
}

#[test]
fn construct_from_channels() {
    let buff = three_channels();
    assert_eq!(buff.channel_count(), 3);
    assert_eq!(buff.frames(), 10);
    assert_eq!(buff.channel(1)[0], 10.0);
}

#[test]
#[should_panic(expected = "same length")]
fn construct_ragged_channels() {
    SampleBuffer::from_channels(vec![vec![0.0; 3], vec![0.0; 4]]);
}

#[test]
fn sequential_iteration() {
    let buff = three_channels();
    let expected: Vec<f64> = (0..30).map(f64::from).collect();
    let got: Vec<f64> = buff.iter_sequential().copied().collect();
    assert_eq!(got, expected);
}

#[test]
fn interleaved_iteration() {
    let buff = three_channels();
    // Frame-major: frame 0 of every channel, then frame 1, ...
    let expected: Vec<f64> = (0..10)
        .flat_map(|frame| vec![frame as f64, frame as f64 + 10.0, frame as f64 + 20.0])
        .collect();
    let got: Vec<f64> = buff.iter_interleaved().collect();
    assert_eq!(got, expected);
}

/// Position helpers agree with where the values actually live.
#[test]
fn interleaved_position() {
    let buff = three_channels();
    for index in 0..buff.total_samples() {
        let (channel, frame) = buff.interleaved_position(index);
        assert_eq!(buff.get_interleaved(index), buff.get(channel, frame));
        assert_eq!(channel, index % 3);
        assert_eq!(frame, index / 3);
    }
}

/// The two layouts visit every sample exactly once; one is a permutation of
/// the other.
#[test]
fn layouts_are_permutations() {
    let buff = three_channels();
    let mut sequential: Vec<f64> = buff.iter_sequential().copied().collect();
    let mut interleaved: Vec<f64> = buff.iter_interleaved().collect();
    assert_eq!(sequential.len(), buff.total_samples());
    assert_eq!(interleaved.len(), buff.total_samples());
    sequential.sort_by(|a, b| a.partial_cmp(b).unwrap());
    interleaved.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(sequential, interleaved);
}

#[test]
fn interleaved_writes() {
    let mut buff = SampleBuffer::new(3, 2);
    buff.fill_interleaved_from(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(buff.channel(0), &[1.0, 3.0, 5.0]);
    assert_eq!(buff.channel(1), &[2.0, 4.0, 6.0]);

    buff.set_interleaved(1, 20.0);
    assert_eq!(buff.channel(1)[0], 20.0);

    // Mutable interleaved visiting sees the same order the iterator reads.
    let mut seen = Vec::new();
    buff.for_each_interleaved_mut(|index, sample| {
        seen.push((index, *sample));
        *sample *= 2.0;
    });
    assert_eq!(seen[0], (0, 1.0));
    assert_eq!(seen[1], (1, 20.0));
    assert_eq!(buff.channel(0), &[2.0, 6.0, 10.0]);
}

// --- PCM conversions ---

/// The documented midpoint results. These are part of the byte contract and
/// must hold exactly.
#[test]
fn midpoint_quirks() {
    assert_eq!(sample_to_u8(0.5), 191);
    assert_eq!(sample_to_u16(0.5), 49151);
}

#[test]
fn boundary_values() {
    assert_eq!(sample_to_i8(-1.0), -128);
    assert_eq!(sample_to_i8(1.0), 127);
    assert_eq!(sample_to_i8(0.0), 0);

    assert_eq!(sample_to_u8(-1.0), 0);
    assert_eq!(sample_to_u8(1.0), 255);
    assert_eq!(sample_to_u8(0.0), 128);

    assert_eq!(sample_to_i16(-1.0), -32768);
    assert_eq!(sample_to_i16(1.0), 32767);
    assert_eq!(sample_to_i16(-0.5), -16384);
    assert_eq!(sample_to_i16(0.5), 16383);

    assert_eq!(sample_to_u16(-1.0), 0);
    assert_eq!(sample_to_u16(1.0), 65535);
    assert_eq!(sample_to_u16(0.0), 32768);
}

/// Encode-decode recovers every normalized value within the width's
/// tolerance.
#[test]
fn round_trips() {
    for step in -64..=64 {
        let x = f64::from(step) / 64.0;

        let via_i16 = i16_to_sample(sample_to_i16(x));
        assert_abs_diff_eq!(x, via_i16, epsilon = 1.001 / 32767.0);

        let via_u16 = u16_to_sample(sample_to_u16(x));
        assert_abs_diff_eq!(x, via_u16, epsilon = 1.001 / 32768.0);

        let via_i8 = i8_to_sample(sample_to_i8(x));
        assert_abs_diff_eq!(x, via_i8, epsilon = 1.001 / 127.0);

        let via_u8 = u8_to_sample(sample_to_u8(x));
        assert_abs_diff_eq!(x, via_u8, epsilon = 1.001 / 255.0);
    }
}

#[test]
fn squish_orders() {
    let buff = SampleBuffer::from_channels(vec![vec![-1.0, 0.0, 0.5], vec![1.0, 0.25, -0.5]]);

    let inter = squish_interleaved(&buff, |s| s);
    assert_eq!(inter, vec![-1.0, 1.0, 0.0, 0.25, 0.5, -0.5]);

    let seq = squish_sequential(&buff, |s| s);
    assert_eq!(seq, vec![-1.0, 0.0, 0.5, 1.0, 0.25, -0.5]);
}

#[test]
fn split_inverts_squish() {
    let buff = SampleBuffer::from_channels(vec![vec![-1.0, 0.0, 0.5], vec![1.0, 0.25, -0.5]]);

    let inter = squish_interleaved(&buff, |s| s);
    let back = split_interleaved(&inter, 2, buff.sample_rate(), |s| s);
    assert_eq!(back.channel(0), buff.channel(0));
    assert_eq!(back.channel(1), buff.channel(1));

    let seq = squish_sequential(&buff, |s| s);
    let back = split_sequential(&seq, 2, buff.sample_rate(), |s| s);
    assert_eq!(back.channel(0), buff.channel(0));
    assert_eq!(back.channel(1), buff.channel(1));
}

/// The full device path: squish to 16-bit PCM, split back, samples survive
/// within 16-bit tolerance.
#[test]
fn pcm_byte_contract() {
    let buff = SampleBuffer::from_channels(vec![
        vec![-1.0, -0.25, 0.0, 0.25, 0.5],
        vec![1.0, 0.75, -0.75, 0.125, -0.5],
    ]);

    let encoded = squish_interleaved(&buff, sample_to_i16);
    let decoded = split_interleaved(&encoded, 2, buff.sample_rate(), i16_to_sample);

    for (original, recovered) in buff.iter_sequential().zip(decoded.iter_sequential()) {
        assert_abs_diff_eq!(original, recovered, epsilon = 1.001 / 32767.0);
    }
}
