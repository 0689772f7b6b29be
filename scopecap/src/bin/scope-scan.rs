//! Discover SCPI instruments on the local network and USB bus
//!
//! `scan.*` settings come from the same configuration as `scope-capture`.

use anyhow::Context;
use tracing::info;

use scopecap::scan::{format_table, write_csv};
use scopecap::{Config, Scanner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scopecap::init_tracing();

    let config = Config::load().context("loading configuration")?;
    let backend = scopecap_transport::default_backend(config.capture.idle_timeout());
    info!("Instrument scan ({} backend)", backend.name());

    let scanner = Scanner::new(config.scan.clone(), backend);
    let report = scanner.run().await.context("scan failed")?;

    println!("Scan started {}", report.started_at.format("%Y-%m-%d  %H:%M:%S"));
    if report.is_empty() {
        println!("No instruments found.");
    } else {
        print!("{}", format_table(&report.entries));
    }

    if let Some(path) = &config.scan.csv_output {
        write_csv(&report.entries, path).with_context(|| format!("writing {}", path.display()))?;
        println!("CSV saved to {}", path.display());
    }

    Ok(())
}
