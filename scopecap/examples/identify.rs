//! Ask a LeCroy scope for its identity over native VICP

use std::time::Duration;

use scopecap::InstrumentIdentity;
use scopecap_core::constants::{IDN_QUERY, VICP_IDN_DELAY, VICP_PORT};
use scopecap_transport::{TcpTransport, VicpClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Change to your scope IP
    let ip = std::env::var("SCOPE_IP").unwrap_or_else(|_| "192.168.1.50".to_string());

    println!("Connecting to {}:{} via VICP...", ip, VICP_PORT);

    let transport = TcpTransport::new(ip, VICP_PORT).with_connect_timeout(Duration::from_secs(3));
    let mut client = VicpClient::new(Box::new(transport)).with_read_timeout(Duration::from_secs(5));

    client.connect().await?;
    println!("✓ Connected!");

    let idn = client.query(IDN_QUERY, VICP_IDN_DELAY).await?;
    let identity = InstrumentIdentity::parse(&idn)?;
    println!("✓ {}", identity);

    client.disconnect().await?;
    println!("✓ Disconnected");

    Ok(())
}
