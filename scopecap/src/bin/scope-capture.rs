//! Capture one oscilloscope screenshot
//!
//! Settings come from `scopecap.toml` (or `$SCOPECAP_CONFIG`) and
//! `SCOPECAP__*` environment variables, e.g.
//!
//! ```text
//! SCOPECAP__CONNECTION__ADDRESS=192.168.1.50 scope-capture
//! SCOPECAP__CONNECTION__MODE=usb scope-capture
//! ```

use anyhow::Context;
use tracing::{error, info};

use scopecap::{Config, ConnectionMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scopecap::init_tracing();

    let config = Config::load().context("loading configuration")?;
    info!("Oscilloscope screen capture ({})", config.connection.mode);

    match scopecap::capture::run(&config).await {
        Ok(outcome) => {
            println!("✓ Vendor: {}", outcome.vendor.display_name());
            println!("✓ Transport: {}", outcome.transport);
            match outcome.saved.dimensions {
                Some((w, h)) => println!("✓ Saved {} ({}x{})", outcome.saved.path.display(), w, h),
                None => println!("✓ Saved raw bytes to {}", outcome.saved.path.display()),
            }
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            print_hints(config.connection.mode, &config.connection.address);
            std::process::exit(1);
        }
    }
}

fn print_hints(mode: ConnectionMode, address: &str) {
    eprintln!("\nScreenshot could not be captured. Things to check:");
    match mode {
        ConnectionMode::Ethernet => {
            eprintln!("  - Ping {} from this machine", address);
            eprintln!("  - Put this machine and the scope on the same subnet, or add a route");
            eprintln!("  - On the scope, enable remote control over the network");
            eprintln!("  - Set connection.port = 0 to try every protocol port");
            eprintln!("  - Make sure no firewall blocks ports 1861 and 5025");
        }
        ConnectionMode::Usb => {
            eprintln!("  - Check the USB cable and the scope's USB device port");
            eprintln!("  - Build with `--features visa` and install a VISA library for USB-TMC");
            eprintln!("  - Set connection.usb_resource to the exact resource string");
        }
    }
}
