//! List attached GestureCam devices and query the first one.
//!
//! Usage: cargo run --example inspect

fn main() {
    env_logger::init();

    let ctx = match rusb::Context::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("USB context error: {}", e);
            std::process::exit(1);
        }
    };

    match gesturecam::list_devices(&ctx) {
        Ok(devices) => {
            println!("Found {} GestureCam device(s):", devices.len());
            for (i, dev) in devices.iter().enumerate() {
                println!(
                    "  [{}] bus={} addr={} serial={}",
                    i,
                    dev.bus_number,
                    dev.device_address,
                    dev.serial.as_deref().unwrap_or("<none>")
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    let cam = match gesturecam::GestureCam::open_first(&ctx) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to open device: {}", e);
            std::process::exit(1);
        }
    };

    println!("Serial:     {}", cam.serial().unwrap_or("<none>"));
    match cam.controls().fpga_state() {
        Ok(state) => println!("FPGA state: {}", state),
        Err(e) => println!("FPGA state: error ({})", e),
    }

    match cam.read_rom(0, 64) {
        Ok(rom) => {
            println!("ROM[0..64]:");
            for chunk in rom.chunks(16) {
                let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
                println!("  {}", hex.join(" "));
            }
        }
        Err(e) => println!("ROM read failed: {}", e),
    }
}
