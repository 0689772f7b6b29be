//! Capture orchestrator
//!
//! Walks the transport candidates in order. Each attempt connects,
//! identifies the instrument, runs its vendor's capture sequence and receives
//! the image; the first attempt that yields enough bytes is decoded and
//! written once. Native VICP is used for LeCroy instruments, everything else
//! goes through an [`InstrumentBackend`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Local;
use tracing::{debug, info, warn};

use scopecap_core::constants::{
    FALLBACK_TRIGGER_BYTES, HTTP_PORT, IDN_QUERY, VICP_DELAYS, VICP_IDN_DELAY, VICP_PORT,
};
use scopecap_core::vendor::LECROY;
use scopecap_core::{resource, strip_block_header, Vendor, VendorProfile};
use scopecap_transport::{Instrument, InstrumentBackend, TcpTransport, Transport, VicpClient};
use scopecap_types::{ConnectionMode, InstrumentIdentity};

use crate::config::{CaptureConfig, Config};
use crate::error::{AttemptFailure, Error, Result};
use crate::net;
use crate::output::{self, SavedImage};
use crate::selector::{self, Candidate};
use crate::session::{CaptureSession, CaptureState, FailureStage};

/// Opens the byte transport under a VICP client
pub trait Dialer: Send + Sync {
    fn dial(&self, host: &str, port: u16, timeout: Duration) -> Box<dyn Transport>;
}

/// Plain TCP
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial(&self, host: &str, port: u16, timeout: Duration) -> Box<dyn Transport> {
        Box::new(TcpTransport::new(host, port).with_connect_timeout(timeout))
    }
}

/// A finished capture
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    /// Transport that delivered the image
    pub transport: Candidate,
    pub vendor: Vendor,
    /// Payload size after the block header was stripped
    pub payload_len: usize,
    pub saved: SavedImage,
}

pub struct Capturer {
    config: CaptureConfig,
    backend: Arc<dyn InstrumentBackend>,
    dialer: Arc<dyn Dialer>,
}

impl Capturer {
    pub fn new(config: CaptureConfig, backend: Arc<dyn InstrumentBackend>) -> Self {
        Self {
            config,
            backend,
            dialer: Arc::new(TcpDialer),
        }
    }

    /// Replace the transport used for native VICP
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// Try `candidates` in order and write the first image received to `output`
    ///
    /// # Errors
    ///
    /// `Exhausted` when no candidate produced an image; a `Write` stage
    /// failure when the image could not be saved.
    pub async fn capture(&self, candidates: &[Candidate], output: &Path) -> Result<CaptureOutcome> {
        let mut session = CaptureSession::new(output);
        let mut failures = Vec::new();

        for candidate in candidates {
            session.begin(candidate.to_string())?;
            info!("Trying {}", candidate);

            match self.attempt(&mut session, candidate).await {
                Ok(()) => return self.finish(&mut session).await,
                Err(e) if e.is_recoverable() => {
                    let stage = e
                        .stage()
                        .or_else(|| session.state().stage())
                        .unwrap_or(FailureStage::Connect);
                    let reason = match e {
                        Error::Stage { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    if !session.state().is_terminal() {
                        session.fail(stage, &reason);
                    }

                    warn!("{} failed at {}: {}", candidate, stage, reason);
                    failures.push(AttemptFailure {
                        candidate: candidate.to_string(),
                        stage,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Exhausted { attempts: failures })
    }

    async fn attempt(&self, session: &mut CaptureSession, candidate: &Candidate) -> Result<()> {
        match candidate {
            Candidate::Vicp { host, port } => self.attempt_vicp(session, host, *port).await,
            Candidate::Resource(resource) => self.attempt_generic(session, resource).await,
        }
    }

    fn vicp_client(&self, host: &str, port: u16) -> VicpClient {
        let timeout = self.config.timeout();
        VicpClient::new(self.dialer.dial(host, port, timeout)).with_read_timeout(timeout)
    }

    async fn attempt_vicp(&self, session: &mut CaptureSession, host: &str, port: u16) -> Result<()> {
        session.advance(CaptureState::Connecting)?;
        let mut client = self.vicp_client(host, port);
        session.check(FailureStage::Connect, client.connect().await)?;
        info!("Connected to VICP {}", client.remote_addr());

        let result = self.vicp_exchange(session, &mut client).await;
        let _ = client.disconnect().await;
        let image = result?;

        session.set_transport(Candidate::Vicp {
            host: host.to_string(),
            port,
        });
        self.accept_image(session, image)
    }

    async fn vicp_exchange(&self, session: &mut CaptureSession, client: &mut VicpClient) -> Result<Bytes> {
        session.advance(CaptureState::Identifying)?;
        let idn = session.check(
            FailureStage::Identify,
            client.query(IDN_QUERY, VICP_IDN_DELAY).await,
        )?;

        let vendor = identify(session, &idn);
        if !vendor.is_native_vicp() {
            return Err(session.fail(
                FailureStage::VendorMismatch,
                format!("'{}' is not a VICP instrument", idn),
            ));
        }

        session.advance(CaptureState::Configuring)?;
        session.check(FailureStage::Configure, self.vicp_configure(client).await)?;

        session.advance(CaptureState::Triggering)?;
        session.check(FailureStage::Trigger, self.vicp_trigger(client).await)?;

        session.advance(CaptureState::Receiving)?;
        let image = session.check(FailureStage::Receive, client.receive_response().await)?;
        info!("Received {} bytes over VICP", image.len());
        Ok(image)
    }

    async fn vicp_configure(&self, client: &mut VicpClient) -> scopecap_transport::Result<()> {
        for command in LECROY.configure_commands(self.config.background) {
            client.send_command(&command).await?;
        }
        pause(self.config.delays(VICP_DELAYS).settle).await;
        Ok(())
    }

    async fn vicp_trigger(&self, client: &mut VicpClient) -> scopecap_transport::Result<()> {
        client
            .send_command(&LECROY.trigger_command(self.config.background))
            .await?;
        pause(self.config.delays(VICP_DELAYS).render).await;
        Ok(())
    }

    /// Screen dump over native VICP without identifying first
    async fn vicp_fallback(&self, session: &mut CaptureSession, host: &str) -> Result<Bytes> {
        let mut client = self.vicp_client(host, VICP_PORT);
        session.check(FailureStage::Receive, client.connect().await)?;

        let result = async {
            self.vicp_configure(&mut client).await?;
            self.vicp_trigger(&mut client).await?;
            client.receive_response().await
        }
        .await;
        let _ = client.disconnect().await;

        let image = session.check(FailureStage::Receive, result)?;
        info!("Received {} bytes over VICP fallback", image.len());
        Ok(image)
    }

    async fn attempt_generic(&self, session: &mut CaptureSession, resource: &str) -> Result<()> {
        session.advance(CaptureState::Connecting)?;
        let mut instrument = session.check(
            FailureStage::Connect,
            selector::open_with_suffix_repair(self.backend.as_ref(), resource, self.config.timeout()).await,
        )?;
        let opened = instrument.resource().to_string();
        info!("Opened {} ({} backend)", opened, self.backend.name());

        let result = self.generic_exchange(session, instrument.as_mut()).await;
        let _ = instrument.close().await;
        let image = result?;

        session.set_transport(Candidate::Resource(opened.clone()));

        if image.len() < self.config.min_image_bytes && session.vendor().is_native_vicp() {
            if let Some(host) = resource::tcpip_host(&opened) {
                warn!(
                    "Only {} bytes via {}, retrying over native VICP at {}",
                    image.len(),
                    opened,
                    host
                );
                let image = self.vicp_fallback(session, host).await?;
                session.set_transport(Candidate::Vicp {
                    host: host.to_string(),
                    port: VICP_PORT,
                });
                return self.accept_image(session, image);
            }
        }

        self.accept_image(session, image)
    }

    async fn generic_exchange(
        &self,
        session: &mut CaptureSession,
        instrument: &mut dyn Instrument,
    ) -> Result<Bytes> {
        session.advance(CaptureState::Identifying)?;
        let idn = session.check(FailureStage::Identify, instrument.query(IDN_QUERY).await)?;

        let vendor = identify(session, &idn);
        let Some(profile) = vendor.profile() else {
            return Err(session.fail(
                FailureStage::VendorMismatch,
                format!("unrecognised identity '{}'", idn),
            ));
        };
        let delays = self.config.delays(profile.delays);
        let background = self.config.background;

        session.advance(CaptureState::Configuring)?;
        let commands = profile.configure_commands(background);
        for command in &commands {
            session.check(FailureStage::Configure, instrument.write(command).await)?;
        }
        if !commands.is_empty() {
            pause(delays.settle).await;
        }

        session.advance(CaptureState::Triggering)?;
        session.check(
            FailureStage::Trigger,
            instrument.write(&profile.trigger_command(background)).await,
        )?;
        pause(delays.render).await;

        session.advance(CaptureState::Receiving)?;
        let mut image = read_image(session, instrument).await?;

        if image.len() < FALLBACK_TRIGGER_BYTES {
            if let Some(fallback) = profile.fallback_trigger {
                debug!("{} byte reply, sending {}", image.len(), fallback);
                session.check(FailureStage::Receive, instrument.write(fallback).await)?;
                pause(delays.render).await;
                image = read_image(session, instrument).await?;
            }
        }

        info!("Received {} bytes from {} ({})", image.len(), instrument.resource(), describe(profile));
        Ok(image)
    }

    /// Keep `image` if it is large enough to be one
    fn accept_image(&self, session: &mut CaptureSession, image: Bytes) -> Result<()> {
        if image.len() < self.config.min_image_bytes {
            return Err(session.fail(
                FailureStage::Receive,
                format!(
                    "only {} bytes received (minimum {})",
                    image.len(),
                    self.config.min_image_bytes
                ),
            ));
        }

        session.set_image(image);
        Ok(())
    }

    async fn finish(&self, session: &mut CaptureSession) -> Result<CaptureOutcome> {
        session.advance(CaptureState::Decoding)?;
        let received = session.image().clone();
        let payload = received.slice_ref(strip_block_header(&received));
        if payload.is_empty() {
            return Err(session.fail(FailureStage::Decode, "empty image payload"));
        }
        debug!("Image payload: {} of {} bytes", payload.len(), received.len());

        session.advance(CaptureState::Writing)?;
        let path = session.output().clone();
        let data = payload.clone();
        let saved = tokio::task::spawn_blocking(move || output::save_image(&data, &path)).await;
        let saved = match saved {
            Ok(Ok(saved)) => saved,
            Ok(Err(e)) => return Err(session.fail(FailureStage::Write, e)),
            Err(e) => return Err(session.fail(FailureStage::Write, e)),
        };

        session.advance(CaptureState::Done)?;
        let transport = session
            .transport()
            .cloned()
            .unwrap_or_else(|| Candidate::Resource(session.candidate().to_string()));

        info!("Capture complete via {}: {}", transport, saved.path.display());
        Ok(CaptureOutcome {
            transport,
            vendor: session.vendor(),
            payload_len: payload.len(),
            saved,
        })
    }
}

fn identify(session: &mut CaptureSession, idn: &str) -> Vendor {
    let vendor = Vendor::detect(idn);
    match InstrumentIdentity::parse(idn) {
        Ok(identity) => info!("{} -> {}", identity, vendor),
        Err(_) => info!("Empty identity -> {}", vendor),
    }
    session.set_vendor(vendor);
    vendor
}

/// Read one binary reply, treating a silent or closed instrument as empty
async fn read_image(session: &mut CaptureSession, instrument: &mut dyn Instrument) -> Result<Bytes> {
    match instrument.read_raw().await {
        Ok(image) => Ok(image),
        Err(e) if e.ends_stream() => {
            debug!("No image data ({})", e);
            Ok(Bytes::new())
        }
        Err(e) => Err(session.fail(FailureStage::Receive, e)),
    }
}

fn describe(profile: &VendorProfile) -> String {
    format!("{} profile, {}", profile.vendor, profile.format.extension().to_ascii_uppercase())
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// One capture as configured: pre-flight, candidate selection, capture
pub async fn run(config: &Config) -> Result<CaptureOutcome> {
    let output = output::timestamped_path(&config.capture.output, Local::now());
    info!("Connection: {}", config.connection.mode);
    info!("Output: {}", output.display());

    let backend = scopecap_transport::default_backend(config.capture.idle_timeout());
    debug!("Generic-driver backend: {}", backend.name());

    let candidates = match config.connection.mode {
        ConnectionMode::Ethernet => {
            let ip = net::validate_ip(&config.connection.address)?;
            let host = ip.to_string();
            net::log_route(ip).await;

            if let Some((username, password)) = config.connection.credentials() {
                match net::http_login(&host, HTTP_PORT, username, password, config.capture.timeout()).await {
                    Ok(status) => info!("HTTP login to {} returned {}", host, status),
                    Err(e) => warn!("HTTP login to {} failed: {}", host, e),
                }
            }

            if net::check_reachable(ip).await.is_empty() {
                warn!("{} may still answer through VISA, continuing", host);
            }
            selector::ethernet_candidates(&host, config.connection.port)
        }
        ConnectionMode::Usb => {
            let resource = match config.connection.usb_resource() {
                Some(resource) => resource.to_string(),
                None => selector::find_usb_resource(backend.as_ref())
                    .await
                    .ok_or(Error::NoUsbInstrument)?,
            };
            info!("Using USB resource {}", resource);
            selector::usb_candidates(&resource)
        }
    };

    Capturer::new(config.capture.clone(), backend)
        .capture(&candidates, &output)
        .await
}
