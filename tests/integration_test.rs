use adpcm_stream::player::{AdpcmPlayer, I1F15};
use adpcm_stream::{
    AdpcmSpecs, AdpcmStream, ByteSource, ConfigurationError, IoSource, SliceSource, Variant,
};
use approx::assert_relative_eq;

fn specs(variant: Variant, num_channels: u16, block_align: u32) -> AdpcmSpecs {
    AdpcmSpecs {
        variant,
        sample_rate: 22050,
        num_channels,
        block_align,
    }
}

fn decode_all<S: ByteSource>(stream: &mut AdpcmStream<S>) -> Vec<i16> {
    let mut out = Vec::new();
    let mut buf = [0i16; 7];
    loop {
        let n = stream.read_buffer(&mut buf);
        out.extend_from_slice(&buf[..n]);
        if n < buf.len() {
            break;
        }
    }
    out
}

fn open(data: &[u8], specs: AdpcmSpecs) -> AdpcmStream<SliceSource<'_>> {
    AdpcmStream::new(SliceSource::new(data), data.len() as u64, specs).unwrap()
}

/// Pseudo random bytes, enough to exercise every code.
fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut x = seed;
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(1103515245).wrapping_add(12345);
            (x >> 16) as u8
        })
        .collect()
}

#[test]
fn oki_stereo_splits_nibbles() {
    let data = [0x3Cu8];
    let mut stream = open(&data, specs(Variant::Oki, 2, 0));
    let mut out = [0i16; 4];
    assert_eq!(stream.read_buffer(&mut out), 2);
    assert_eq!(&out[..2], &[14 * 16, -18 * 16]);
    assert!(stream.is_stereo());
}

#[test]
fn ima_mono_high_nibble_first() {
    let data = [0x12u8];
    let mut stream = open(&data, specs(Variant::Ima, 1, 0));
    let mut out = [0i16; 2];
    assert_eq!(stream.read_buffer(&mut out), 2);
    // code 1: (7 + 3) >> 3 = 1, code 2: (14 + 3) >> 3 = 2
    assert_eq!(out, [1, 3]);
}

#[test]
fn dvi_mono_low_nibble_first() {
    let data = [0x12u8];
    let mut stream = open(&data, specs(Variant::Dvi, 1, 0));
    let mut out = [0i16; 2];
    assert_eq!(stream.read_buffer(&mut out), 2);
    assert_eq!(out, [2, 3]);
}

#[test]
fn dvi_stereo_rewind_replays_from_the_start() {
    let data = noise(64, 7);
    let mut stream = open(&data, specs(Variant::Dvi, 2, 0));

    let mut first = [0i16; 21];
    assert_eq!(stream.read_buffer(&mut first), 21);
    // stop mid-byte: one nibble is still pending
    let mut more = [0i16; 5];
    assert_eq!(stream.read_buffer(&mut more), 5);

    stream.rewind().unwrap();
    let mut replay = [0i16; 21];
    assert_eq!(stream.read_buffer(&mut replay), 21);
    assert_eq!(first, replay);
}

#[test]
fn ms_ima_mono_block_headers() {
    let data = [
        // block 0: predictor 100, index 0
        0x64, 0x00, 0x00, 0x00, 0x12, 0x00, //
        // block 1: predictor -100, index 0
        0x9C, 0xFF, 0x00, 0x00, 0x00, 0x11,
    ];
    let v = Variant::MsIma {
        invert_samples: false,
    };
    let mut stream = open(&data, specs(v, 1, 6));
    let out = decode_all(&mut stream);
    // the header sample itself is not emitted
    assert_eq!(out, vec![102, 103, 103, 103, -100, -100, -99, -98]);
    assert!(stream.end_of_data());
    assert!(!stream.is_truncated());
}

#[test]
fn ms_ima_stereo_interleaves_data_words() {
    let mut data = vec![
        0x00, 0x00, 0x00, 0x00, // ch0: predictor 0, index 0
        0xE8, 0x03, 0x00, 0x00, // ch1: predictor 1000, index 0
    ];
    data.extend_from_slice(&[0x22; 4]); // ch0: +2 per sample
    data.extend_from_slice(&[0xAA; 4]); // ch1: -2 per sample
    let v = Variant::MsIma {
        invert_samples: false,
    };
    let mut stream = open(&data, specs(v, 2, 16));

    let out = decode_all(&mut stream);
    let expected: Vec<i16> = (1..=8).flat_map(|i| [2 * i, 1000 - 2 * i]).collect();
    assert_eq!(out, expected);

    let v = Variant::MsIma {
        invert_samples: true,
    };
    let mut stream = open(&data, specs(v, 2, 16));
    let out = decode_all(&mut stream);
    let expected: Vec<i16> = (1..=8).flat_map(|i| [-2 * i, 1000 + 2 * i]).collect();
    assert_eq!(out, expected);
}

#[test]
fn ms_ima_stereo_skips_partial_group() {
    let mut data = vec![0u8; 8];
    data.extend_from_slice(&[0x11; 8]);
    data.extend_from_slice(&[0x77; 3]); // not a whole group
    let v = Variant::MsIma {
        invert_samples: false,
    };
    let mut stream = open(&data, specs(v, 2, 19));
    let out = decode_all(&mut stream);
    assert_eq!(out.len(), 16);
    assert!(stream.end_of_data());
}

#[test]
fn apple_ima_mono() {
    let data = [0x01u8, 0x00, 0x21, 0x43];
    let mut stream = open(&data, specs(Variant::AppleIma, 1, 4));
    let out = decode_all(&mut stream);
    assert_eq!(out, vec![257, 259, 262, 265]);
    assert!(stream.end_of_data());
}

#[test]
fn apple_ima_stereo_alternating_chunks() {
    let data = [
        0x00u8, 0x00, 0x11, 0x11, // left, chunk 0
        0xFF, 0x80, 0x99, 0x99, // right, chunk 0
        0x02, 0x00, 0x00, 0x00, // left, chunk 1
        0x00, 0x00, 0x00, 0x00, // right, chunk 1
    ];
    let mut stream = open(&data, specs(Variant::AppleIma, 2, 4));
    let out = decode_all(&mut stream);
    assert_eq!(
        out,
        vec![1, -129, 2, -130, 3, -131, 4, -132, 512, 0, 512, 0, 512, 0, 512, 0]
    );
    assert!(stream.end_of_data());
}

fn dk3_header(sum: i16, diff: i16) -> Vec<u8> {
    let mut h = vec![0x00, 0x00];
    h.extend_from_slice(&22050u16.to_le_bytes());
    h.extend_from_slice(&[0; 6]);
    h.extend_from_slice(&sum.to_le_bytes());
    h.extend_from_slice(&diff.to_le_bytes());
    h.extend_from_slice(&[0, 0]);
    h
}

#[test]
fn dk3_sum_and_difference() {
    let mut data = dk3_header(100, 10);
    data.extend_from_slice(&[0x21, 0x03, 0x00]);
    let mut stream = open(&data, specs(Variant::Dk3, 2, 19));
    let out = decode_all(&mut stream);
    assert_eq!(out, vec![113, 89, 116, 92, 116, 92, 116, 92]);
    assert!(stream.end_of_data());
}

#[test]
fn dk3_group_cut_by_block_boundary() {
    let mut data = dk3_header(0, 0);
    data.extend_from_slice(&[0x11, 0x11]);
    data.extend_from_slice(&dk3_header(1000, 0));
    data.extend_from_slice(&[0x00, 0x00]);
    let mut stream = open(&data, specs(Variant::Dk3, 2, 18));
    let out = decode_all(&mut stream);
    assert_eq!(out, vec![2, 0, 3, 1, 1000, 1000, 1000, 1000]);
}

#[test]
fn dk3_is_stereo_only() {
    let r = AdpcmStream::new(SliceSource::new(&[]), 0, specs(Variant::Dk3, 1, 64));
    assert_eq!(r.err(), Some(ConfigurationError::Dk3RequiresStereo(1)));
}

#[test]
fn zero_block_align_is_rejected() {
    for v in [
        Variant::MsIma {
            invert_samples: false,
        },
        Variant::MsAdpcm,
    ] {
        let r = AdpcmStream::new(SliceSource::new(&[]), 0, specs(v, 1, 0));
        assert_eq!(r.err(), Some(ConfigurationError::MissingBlockAlign(v)));
    }
}

#[test]
fn ms_adpcm_stereo_block() {
    let data = [
        0x00u8, 0x00, // modes
        0x10, 0x00, 0x10, 0x00, // deltas
        0x64, 0x00, 0xC8, 0x00, // newer: 100, 200
        0x64, 0x00, 0xC8, 0x00, // older: 100, 200
        0x2E, // left +2, right -2
    ];
    let mut stream = open(&data, specs(Variant::MsAdpcm, 2, 15));
    let out = decode_all(&mut stream);
    assert_eq!(out, vec![100, 200, 100, 200, 132, 168]);
}

#[test]
fn ms_adpcm_second_block_reseeds() {
    let mut data = vec![0x00u8, 0x10, 0x00, 0x64, 0x00, 0x64, 0x00, 0x20];
    data.extend_from_slice(&[0x01, 0x10, 0x00, 0x0A, 0x00, 0x05, 0x00, 0x00]);
    let mut stream = open(&data, specs(Variant::MsAdpcm, 1, 8));
    let out = decode_all(&mut stream);
    // mode 1: 2 * 10 - 5 = 15
    assert_eq!(out, vec![100, 100, 132, 132, 5, 10, 15, 20]);
}

#[test]
fn rewind_is_deterministic_for_every_variant() {
    let cases = [
        (Variant::Oki, 2, 0),
        (Variant::Ima, 2, 0),
        (Variant::Dvi, 1, 0),
        (Variant::AppleIma, 2, 34),
        (
            Variant::MsIma {
                invert_samples: false,
            },
            1,
            256,
        ),
        (
            Variant::MsIma {
                invert_samples: true,
            },
            2,
            256,
        ),
        (Variant::Dk3, 2, 256),
        (Variant::MsAdpcm, 2, 256),
    ];
    let data = noise(1024, 42);
    for (variant, ch, align) in cases {
        let mut stream = open(&data, specs(variant, ch, align));
        let first = decode_all(&mut stream);
        assert!(!first.is_empty(), "{variant}");
        assert!(stream.end_of_data(), "{variant}");

        stream.rewind().unwrap();
        let second = decode_all(&mut stream);
        assert_eq!(first, second, "{variant}");
    }
}

#[test]
fn read_buffer_respects_capacity_and_end() {
    let data = noise(300, 3);
    let mut stream = open(&data, specs(Variant::MsAdpcm, 2, 100));
    let mut total = 0;
    for cap in [1usize, 3, 5, 16, 17, 64].iter().cycle() {
        let mut buf = vec![0i16; *cap];
        let n = stream.read_buffer(&mut buf);
        assert!(n <= *cap);
        total += n;
        if stream.end_of_data() {
            break;
        }
    }
    // 3 blocks x (2 header frames + 86 bytes x 2 nibbles) samples
    assert_eq!(total, 3 * (4 + 86 * 2));
    let mut buf = [0i16; 8];
    assert_eq!(stream.read_buffer(&mut buf), 0);
    assert_eq!(stream.read_buffer(&mut buf), 0);
}

#[test]
fn truncated_source_returns_partial_count() {
    let data = [0x64u8, 0x00, 0x00, 0x00, 0x11, 0x11];
    let v = Variant::MsIma {
        invert_samples: false,
    };
    // The block claims 64 bytes but only 6 exist.
    let mut stream = AdpcmStream::new(SliceSource::new(&data), 64, specs(v, 1, 64)).unwrap();
    let mut buf = [0i16; 32];
    assert_eq!(stream.read_buffer(&mut buf), 4);
    assert!(stream.is_truncated());
    assert!(stream.end_of_data());
    assert_eq!(stream.read_buffer(&mut buf), 0);

    stream.rewind().unwrap();
    assert!(!stream.is_truncated());
    assert_eq!(stream.read_buffer(&mut buf), 4);
}

#[test]
fn borrowed_source_is_left_after_the_block() {
    let data = [0xAAu8, 0x55, 0x12, 0x34, 0xFF];
    let mut src = SliceSource::at(&data, 1);
    {
        let mut stream = AdpcmStream::new(&mut src, 3, specs(Variant::Ima, 1, 0)).unwrap();
        assert_eq!(decode_all(&mut stream).len(), 6);
    }
    assert_eq!(src.pos(), 4);
}

#[test]
fn io_source_matches_slice_source() -> anyhow::Result<()> {
    let data = noise(512, 11);
    let s = specs(Variant::MsAdpcm, 1, 128);

    let mut from_slice = open(&data, s);
    let expected = decode_all(&mut from_slice);

    let src = IoSource::new(std::io::Cursor::new(data.clone()))?;
    let mut from_io = AdpcmStream::new(src, data.len() as u64, s)?;
    assert_eq!(decode_all(&mut from_io), expected);
    Ok(())
}

#[test]
fn player_frames_are_normalized() -> anyhow::Result<()> {
    let data = noise(64, 5);
    let s = specs(Variant::Dvi, 2, 0);
    let expected = decode_all(&mut open(&data, s));

    let mut player = AdpcmPlayer::new(open(&data, s));
    let mut frame = [I1F15::ZERO; 2];
    for pair in expected.chunks(2) {
        player.get_next_frame(&mut frame)?;
        for (f, &sample) in frame.iter().zip(pair) {
            assert_relative_eq!(f.to_num::<f32>(), sample as f32 / 32768.0);
        }
    }
    assert!(player.get_next_frame(&mut frame).is_err());
    Ok(())
}
