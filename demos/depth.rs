//! Bring the depth pipeline up and poll for decoded frames.
//!
//! Frame delivery needs a streaming host feeding `depth_sink()`; run
//! standalone this exercises device open, FPGA bring-up, and teardown.
//!
//! Usage: cargo run --example depth

use gesturecam::{FrameRate, GestureCam, MapFlags};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let ctx = match rusb::Context::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("USB context error: {}", e);
            std::process::exit(1);
        }
    };

    let mut cam = match GestureCam::open_first(&ctx) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to open device: {}", e);
            std::process::exit(1);
        }
    };

    cam.set_depth_frame_rate(FrameRate::Fps60).unwrap();
    if let Err(e) = cam.enable(MapFlags::PHASE | MapFlags::CONFIDENCE | MapFlags::DEPTH_COLOR) {
        eprintln!("Failed to start depth stream: {}", e);
        std::process::exit(1);
    }
    println!("Depth stream up (60 fps), polling for 5 seconds...");

    match cam.accel() {
        Ok([x, y, z]) => println!("accel: {} {} {}", x, y, z),
        Err(e) => println!("accel read failed: {}", e),
    }

    let start = Instant::now();
    let mut frames: u64 = 0;
    while start.elapsed() < Duration::from_secs(5) {
        cam.update();
        if cam.is_new_depth_frame() {
            frames += 1;
            if frames % 30 == 0 {
                let phase = cam.phase_pixels();
                let conf = cam.confidence_pixels();
                let mid = phase.len() / 2;
                println!(
                    "frame {}: center phase={} confidence={}",
                    frames, phase[mid], conf[mid]
                );
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    println!("{} frames in 5s", frames);
    if let Err(e) = cam.close() {
        eprintln!("close: {}", e);
    }
}
