// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! End-to-end decoder tests over synthetic MSOP/DIFOP packet streams.
//!
//! The packets are built byte-by-byte against the documented wire layout, so
//! these tests double as a fixture for the format itself.

use itertools::izip;
use mechlidar::{
    calib::{BLOCK_DURATION, MODEL_BASE, MODEL_V},
    difop::{DIFOP_ID, DIFOP_LEN},
    packet::{
        write_timestamp_us, BLOCKS_PER_PACKET, BLOCK_ID, BLOCK_LEN, CHANNELS_PER_BLOCK,
        CHANNEL_LEN, HEADER_LEN, MSOP_ID, MSOP_LEN,
    },
    packet_source::{PacketSource, ReplaySource},
    DecodeError, Decoder, DecoderConfig, EchoMode, PointBuffer,
};
use std::sync::{Arc, Mutex};

/// Build an MSOP packet: embedded timestamp, model byte, per-block azimuths,
/// and one distance/intensity pair replicated across every channel.
fn msop_packet(
    model: u8,
    ts_us: u64,
    azimuths: [u16; BLOCKS_PER_PACKET],
    distance_raw: u16,
    intensity: u8,
) -> Vec<u8> {
    let mut buf = vec![0u8; MSOP_LEN];
    buf[..4].copy_from_slice(&MSOP_ID);
    write_timestamp_us(&mut buf[10..20], ts_us);
    buf[31] = model;

    for (blk, az) in azimuths.iter().enumerate() {
        let off = HEADER_LEN + blk * BLOCK_LEN;
        buf[off] = BLOCK_ID;
        buf[off + 1] = 1;
        buf[off + 2..off + 4].copy_from_slice(&az.to_be_bytes());
        for chan in 0..CHANNELS_PER_BLOCK {
            let choff = off + 4 + chan * CHANNEL_LEN;
            buf[choff..choff + 2].copy_from_slice(&distance_raw.to_be_bytes());
            buf[choff + 2] = intensity;
        }
    }
    buf
}

/// Build a DIFOP packet with the given motor speed and return-mode byte.
fn difop_packet(rpm: u16, return_mode: u8) -> Vec<u8> {
    let mut buf = vec![0u8; DIFOP_LEN];
    buf[..8].copy_from_slice(&DIFOP_ID);
    buf[8..10].copy_from_slice(&rpm.to_be_bytes());
    buf[287] = return_mode;
    buf
}

fn sensor_clock_config() -> DecoderConfig {
    DecoderConfig {
        use_sensor_clock: true,
        ..Default::default()
    }
}

#[test]
fn test_valid_packet_emits_full_grid() {
    let mut decoder = Decoder::new(sensor_clock_config()).unwrap();
    let mut frame = PointBuffer::with_capacity(2048);

    // 10 m returns everywhere, azimuths stepping 0.1°
    let mut pkt = msop_packet(MODEL_BASE, 1_000_000, [100, 110, 120, 130], 2000, 42);
    let split = decoder.decode_msop(&mut pkt, &mut frame).unwrap();

    assert!(!split);
    assert_eq!(frame.len(), BLOCKS_PER_PACKET * CHANNELS_PER_BLOCK);
    assert!(frame.x().iter().all(|x| x.is_finite()));
    assert!(frame.intensity().iter().all(|&i| i == 42));

    // Without DIFOP calibration the ring map is the wire channel order
    for blk in 0..BLOCKS_PER_PACKET {
        for chan in 0..CHANNELS_PER_BLOCK {
            assert_eq!(frame.ring()[blk * CHANNELS_PER_BLOCK + chan], chan as u8);
        }
    }

    // Points lie at ~10 m from the sensor
    for (x, y, z) in izip!(frame.x(), frame.y(), frame.z()) {
        let range = (x * x + y * y + z * z).sqrt();
        assert!((range - 10.0).abs() < 0.1, "range {} out of tolerance", range);
    }
}

#[test]
fn test_point_timestamps_follow_firing_table() {
    let mut decoder = Decoder::new(sensor_clock_config()).unwrap();
    let mut frame = PointBuffer::with_capacity(2048);

    // A small base timestamp keeps one f64 ulp far below the microsecond
    // offsets being verified.
    let ts_us = 1_000_000u64;
    let mut pkt = msop_packet(MODEL_BASE, ts_us, [100, 110, 120, 130], 2000, 1);
    decoder.decode_msop(&mut pkt, &mut frame).unwrap();

    let pkt_ts = ts_us as f64 * 1e-6;
    for blk in 0..BLOCKS_PER_PACKET {
        let block_ts = pkt_ts + blk as f64 * BLOCK_DURATION;
        let row = &frame.timestamp()[blk * CHANNELS_PER_BLOCK..(blk + 1) * CHANNELS_PER_BLOCK];

        // First calibration entry is 0.0: channel 0 fires at the block time
        assert!((row[0] - block_ts).abs() < 1e-9);
        // Channel 4 fires 1.217 µs into the block
        assert!((row[4] - (block_ts + 1.217e-6)).abs() < 1e-9);
        // Monotonically non-decreasing within the block
        for pair in row.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }
}

#[test]
fn test_model_switch_selects_alternate_table() {
    let mut decoder = Decoder::new(sensor_clock_config()).unwrap();
    let mut frame = PointBuffer::with_capacity(2048);

    let mut pkt = msop_packet(MODEL_BASE, 1_000_000, [100, 110, 120, 130], 2000, 1);
    decoder.decode_msop(&mut pkt, &mut frame).unwrap();
    let base_offsets = decoder.calibration().time_offset;
    let base_fractions = decoder.calibration().azimuth_fraction;
    let base_chan10_ts = frame.timestamp()[10];

    frame.clear();
    let mut pkt = msop_packet(MODEL_V, 1_000_000, [100, 110, 120, 130], 2000, 1);
    decoder.decode_msop(&mut pkt, &mut frame).unwrap();

    // The new table is in effect and differs from the old one
    assert_ne!(decoder.calibration().time_offset, base_offsets);
    assert_ne!(decoder.calibration().azimuth_fraction, base_fractions);

    // ...and it was applied starting with the first block: channel 10 of
    // block 0 fires at 2.434 µs on the "v" table vs 3.652 µs on the base
    let v_chan10_ts = frame.timestamp()[10];
    assert!((base_chan10_ts - 1.0 - 3.652e-6).abs() < 1e-9);
    assert!((v_chan10_ts - 1.0 - 2.434e-6).abs() < 1e-9);
}

#[test]
fn test_dual_echo_doubles_blocks_per_frame() {
    let mut single = Decoder::new(DecoderConfig::default()).unwrap();
    single.decode_difop(&difop_packet(600, 0x00)).unwrap();
    assert_eq!(single.echo_mode(), EchoMode::Single);

    let mut dual = Decoder::new(DecoderConfig::default()).unwrap();
    dual.decode_difop(&difop_packet(600, 0x03)).unwrap();
    assert_eq!(dual.echo_mode(), EchoMode::Dual);

    assert_eq!(dual.blocks_per_frame(), 2 * single.blocks_per_frame());
    assert_eq!(dual.frame_capacity(), 2 * single.frame_capacity());
}

#[test]
fn test_dual_echo_decodes_paired_blocks() {
    let mut decoder = Decoder::new(sensor_clock_config()).unwrap();
    decoder.decode_difop(&difop_packet(600, 0x04)).unwrap();

    let mut frame = PointBuffer::with_capacity(2048);
    // Paired blocks share the azimuth step
    let mut pkt = msop_packet(MODEL_BASE, 2_000_000, [100, 100, 120, 120], 2000, 9);
    decoder.decode_msop(&mut pkt, &mut frame).unwrap();

    assert_eq!(frame.len(), BLOCKS_PER_PACKET * CHANNELS_PER_BLOCK);

    // Blocks of a pair carry identical timestamps row-for-row
    let rows: Vec<_> = frame.timestamp().chunks(CHANNELS_PER_BLOCK).collect();
    assert_eq!(rows[0], rows[1]);
    assert_eq!(rows[2], rows[3]);
    assert!(rows[2][0] > rows[0][0]);
}

#[test]
fn test_wrong_block_id_aborts_rest_of_packet() {
    let mut decoder = Decoder::new(sensor_clock_config()).unwrap();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    decoder.set_error_callback(move |err| sink.lock().unwrap().push(err));

    let mut frame = PointBuffer::with_capacity(2048);
    let mut pkt = msop_packet(MODEL_BASE, 1_000_000, [100, 110, 120, 130], 2000, 7);
    // Corrupt the id of block 2
    pkt[HEADER_LEN + 2 * BLOCK_LEN] = 0xAB;

    let split = decoder.decode_msop(&mut pkt, &mut frame).unwrap();
    assert!(!split);

    // Blocks 0 and 1 decoded, blocks 2 and 3 abandoned
    assert_eq!(frame.len(), 2 * CHANNELS_PER_BLOCK);

    let errors = errors.lock().unwrap();
    assert_eq!(
        *errors,
        vec![DecodeError::WrongBlockId {
            block: 2,
            found: 0xAB
        }]
    );

    // The decoder is not poisoned: the next packet decodes fully
    drop(errors);
    frame.clear();
    let mut pkt = msop_packet(MODEL_BASE, 1_100_000, [140, 150, 160, 170], 2000, 7);
    decoder.decode_msop(&mut pkt, &mut frame).unwrap();
    assert_eq!(frame.len(), BLOCKS_PER_PACKET * CHANNELS_PER_BLOCK);
}

#[test]
fn test_gap_points_share_valid_timestamps() {
    // Decode the same stream twice: once with in-range distances, once with
    // zero distances (filtered). Gap points must carry the same timestamps
    // and rings as their valid counterparts, with NaN coordinates and zero
    // intensity.
    let azimuths = [100, 110, 120, 130];

    let mut valid_decoder = Decoder::new(sensor_clock_config()).unwrap();
    let mut valid = PointBuffer::with_capacity(2048);
    let mut pkt = msop_packet(MODEL_BASE, 5_000_000, azimuths, 2000, 55);
    valid_decoder.decode_msop(&mut pkt, &mut valid).unwrap();

    let mut gap_decoder = Decoder::new(sensor_clock_config()).unwrap();
    let mut gaps = PointBuffer::with_capacity(2048);
    let mut pkt = msop_packet(MODEL_BASE, 5_000_000, azimuths, 0, 55);
    gap_decoder.decode_msop(&mut pkt, &mut gaps).unwrap();

    assert_eq!(valid.len(), gaps.len());
    for (x, intensity, ts_gap, ts_valid, ring_gap, ring_valid) in izip!(
        gaps.x(),
        gaps.intensity(),
        gaps.timestamp(),
        valid.timestamp(),
        gaps.ring(),
        valid.ring()
    ) {
        assert!(x.is_nan());
        assert_eq!(*intensity, 0);
        assert_eq!(ts_gap, ts_valid);
        assert_eq!(ring_gap, ring_valid);
    }
}

#[test]
fn test_frame_split_per_revolution() {
    let mut decoder = Decoder::new(sensor_clock_config()).unwrap();
    let splits = Arc::new(Mutex::new(Vec::new()));
    let sink = splits.clone();
    decoder.set_split_callback(move |lasers, cloud_ts| {
        sink.lock().unwrap().push((lasers, cloud_ts));
    });

    // Each packet covers one quarter revolution; the azimuth wraps at every
    // packet boundary, so each packet after the first starts a revolution.
    let revolutions = 4;
    let mut frame = PointBuffer::with_capacity(8192);
    let mut packet_split = Vec::new();
    for rev in 0..revolutions {
        let ts_us = 1_000_000 + rev as u64 * 100_000;
        let mut pkt = msop_packet(MODEL_BASE, ts_us, [0, 9000, 18000, 27000], 2000, 1);
        let split = decoder.decode_msop(&mut pkt, &mut frame).unwrap();
        packet_split.push(split);
    }

    assert!(!packet_split[0]);
    assert!(packet_split[1..].iter().all(|&s| s));

    let splits = splits.lock().unwrap();
    assert_eq!(splits.len(), revolutions - 1);
    assert!(splits.iter().all(|&(lasers, _)| lasers == 80));

    // The cloud timestamp reported at split k+1 is the first point
    // timestamp recorded at split k, i.e. the base timestamp of packet k+1
    // (the split lands on block 0, whose offset is zero).
    for (i, &(_, cloud_ts)) in splits.iter().enumerate().skip(1) {
        let expected = (1_000_000 + (i as u64) * 100_000) as f64 * 1e-6;
        assert!(
            (cloud_ts - expected).abs() < 1e-9,
            "split {}: cloud ts {} != {}",
            i,
            cloud_ts,
            expected
        );
    }
}

#[test]
fn test_host_clock_rewrites_packet_timestamp() {
    let config = DecoderConfig {
        use_sensor_clock: false,
        write_packet_timestamp: true,
        ..Default::default()
    };
    let mut decoder = Decoder::new(config).unwrap();
    let mut frame = PointBuffer::with_capacity(2048);

    let mut pkt = msop_packet(MODEL_BASE, 0, [100, 110, 120, 130], 2000, 1);
    let before = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_micros() as u64;
    decoder.decode_msop(&mut pkt, &mut frame).unwrap();

    // The embedded timestamp field was overwritten with host time
    let written = mechlidar::packet::parse_timestamp_us(&pkt[10..20]);
    assert!(written >= before);
    assert!(written - before < 10_000_000, "rewritten ts not near now");

    // The packet base timestamp is backdated by one packet duration
    let expected = written as f64 * 1e-6 - BLOCKS_PER_PACKET as f64 * BLOCK_DURATION;
    assert!((decoder.last_packet_timestamp() - expected).abs() < 1e-6);
}

#[test]
fn test_sensor_clock_leaves_packet_untouched() {
    let mut decoder = Decoder::new(sensor_clock_config()).unwrap();
    let mut frame = PointBuffer::with_capacity(2048);

    let mut pkt = msop_packet(MODEL_BASE, 42_000_000, [100, 110, 120, 130], 2000, 1);
    let original = pkt.clone();
    decoder.decode_msop(&mut pkt, &mut frame).unwrap();

    assert_eq!(pkt, original);
    assert!((decoder.last_packet_timestamp() - 42.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_replay_stream_end_to_end() {
    // Interleave DIFOP and MSOP the way a live capture would and drive the
    // decoder through the packet source abstraction.
    let mut packets = vec![difop_packet(600, 0x00)];
    for rev in 0..3u64 {
        packets.push(msop_packet(
            MODEL_BASE,
            1_000_000 + rev * 100_000,
            [0, 9000, 18000, 27000],
            2000,
            (rev + 1) as u8,
        ));
    }

    let mut source = ReplaySource::new(packets);
    let mut decoder = Decoder::new(sensor_clock_config()).unwrap();
    let mut frame = PointBuffer::with_capacity(decoder.frame_capacity());
    let mut buf = [0u8; 2048];
    let mut frames_completed = 0;

    while source.has_more() {
        let len = source.recv(&mut buf).await.expect("replay failed");
        let packet = &mut buf[..len];

        if packet.len() == DIFOP_LEN && packet[..8] == DIFOP_ID {
            decoder.decode_difop(packet).unwrap();
            continue;
        }

        if decoder.decode_msop(packet, &mut frame).unwrap() {
            frames_completed += 1;
            assert!(!frame.is_empty());
            frame.clear();
        }
    }

    assert_eq!(frames_completed, 2);
    assert_eq!(decoder.echo_mode(), EchoMode::Single);
    assert!(decoder.device_info().is_some());
    assert_eq!(decoder.device_info().unwrap().rpm, 600);
}
