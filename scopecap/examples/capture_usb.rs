//! Capture from the first USB scope the VISA library can see
//!
//! Run with `cargo run --example capture_usb --features visa`.

use std::path::Path;

use chrono::Local;
use scopecap::output::timestamped_path;
use scopecap::selector::{find_usb_resource, usb_candidates};
use scopecap::{Capturer, Config};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    scopecap::init_tracing();

    let config = Config::load()?;
    let backend = scopecap_transport::default_backend(config.capture.idle_timeout());

    let Some(resource) = find_usb_resource(backend.as_ref()).await else {
        println!("No USB instrument found");
        return Ok(());
    };
    println!("Using {}", resource);

    let output = timestamped_path(Path::new("usb_capture.png"), Local::now());
    let outcome = Capturer::new(config.capture, backend)
        .capture(&usb_candidates(&resource), &output)
        .await?;

    println!("✓ {} ({} bytes)", outcome.saved.path.display(), outcome.saved.size);
    Ok(())
}
