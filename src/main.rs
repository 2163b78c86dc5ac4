// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Diagnostic receiver: binds the sensor's MSOP/DIFOP ports, decodes the
//! packet stream, and logs per-revolution statistics and device status.

use clap::Parser;
use log::{debug, info, warn};
use mechlidar::{Decoder, DecoderConfig, DoubleBuffer};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port receiving MSOP measurement packets
    #[arg(long, env, default_value = "6699")]
    msop_port: u16,

    /// UDP port receiving DIFOP device information packets
    #[arg(long, env, default_value = "7788")]
    difop_port: u16,

    /// Trust the sensor's embedded UTC clock instead of the host clock
    #[arg(long, env)]
    use_sensor_clock: bool,

    /// With host-clock timestamps, rewrite each packet's embedded timestamp
    /// field in place
    #[arg(long, env)]
    write_packet_timestamp: bool,

    /// Suppress gap points for filtered-out channels
    #[arg(long, env)]
    dense: bool,

    /// Minimum valid distance in meters
    #[arg(long, env, default_value = "0.4")]
    min_distance: f32,

    /// Maximum valid distance in meters
    #[arg(long, env, default_value = "250.0")]
    max_distance: f32,

    /// Scan window start and stop angles in degrees
    #[arg(long, env, num_args = 2, value_names = ["START", "STOP"], value_delimiter = ' ', default_value = "0 360")]
    azimuth: Vec<f32>,

    /// Azimuth at which a new revolution begins, degrees
    #[arg(long, env, default_value = "0")]
    split_angle: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    env_logger::init();

    let config = DecoderConfig {
        use_sensor_clock: args.use_sensor_clock,
        write_packet_timestamp: args.write_packet_timestamp,
        dense_points: args.dense,
        min_distance: args.min_distance,
        max_distance: args.max_distance,
        start_angle: args.azimuth[0],
        end_angle: args.azimuth[1],
        split_angle: args.split_angle,
        ..Default::default()
    };

    let mut decoder = Decoder::new(config)?;
    decoder.set_error_callback(|err| warn!("decode error: {}", err));

    let msop = tokio::net::UdpSocket::bind(format!("0.0.0.0:{}", args.msop_port)).await?;
    let difop = tokio::net::UdpSocket::bind(format!("0.0.0.0:{}", args.difop_port)).await?;
    info!(
        "listening for MSOP on {} and DIFOP on {}",
        args.msop_port, args.difop_port
    );

    let mut frames = DoubleBuffer::new(decoder.frame_capacity());
    let mut frame_count = 0u64;
    let mut seen_device_info = false;

    let mut msop_buf = [0u8; 2048];
    let mut difop_buf = [0u8; 2048];

    loop {
        tokio::select! {
            received = msop.recv_from(&mut msop_buf) => {
                let (len, _src) = received?;
                match decoder.decode_msop(&mut msop_buf[..len], frames.filling_mut()) {
                    Ok(true) => {
                        let completed = frames.swap();
                        frame_count += 1;
                        info!(
                            "frame {}: {} points, first ts {:.6}, temperature {:.1} °C",
                            frame_count,
                            completed.len(),
                            completed.timestamp().first().copied().unwrap_or(0.0),
                            decoder.temperature()
                        );
                    }
                    Ok(false) => {}
                    Err(e) => warn!("dropping MSOP packet: {}", e),
                }
            }
            received = difop.recv_from(&mut difop_buf) => {
                let (len, _src) = received?;
                if let Err(e) = decoder.decode_difop(&difop_buf[..len]) {
                    warn!("dropping DIFOP packet: {}", e);
                    continue;
                }

                // A DIFOP packet can change the echo mode or rotation rate,
                // growing the revolution size.
                if decoder.frame_capacity() > frames.capacity() {
                    debug!("resizing frame buffers to {} points", decoder.frame_capacity());
                    frames = DoubleBuffer::new(decoder.frame_capacity());
                }

                if let Some(device_info) = decoder.device_info() {
                    if !seen_device_info {
                        seen_device_info = true;
                        info!(
                            "device {} fw {} echo {}: {}",
                            device_info.serial_string(),
                            device_info.firmware_string(),
                            decoder.echo_mode(),
                            serde_json::to_string(device_info)?
                        );
                    } else {
                        debug!(
                            "difop: rpm {} sync {:?}/{:?}",
                            device_info.rpm,
                            device_info.time_sync_mode,
                            device_info.time_sync_status
                        );
                    }
                }
            }
        }
    }
}
