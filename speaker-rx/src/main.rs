//! speaker-rx - Main entry point
//!
//! Wires a transport (file replay or TCP) to a streaming session that decodes
//! with symphonia and plays through cpal.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use speaker_common::config::{load_config, ConfigSource};
use speaker_rx::audio::output::list_devices;
use speaker_rx::audio::{CpalOutput, SymphoniaDecoder};
use speaker_rx::config::TomlConfig;
use speaker_rx::transport::{ReplaySource, TcpSource, TransportSummary};
use speaker_rx::Session;
use tokio::signal;
use tracing::{debug, error, info, warn};

/// How often the main task checks whether the session has finished
const FINISH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How often queue/buffer levels are logged at debug level
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Command-line arguments for speaker-rx
#[derive(Parser, Debug)]
#[command(name = "speaker-rx")]
#[command(about = "Streaming compressed-audio receiver and player")]
#[command(version)]
struct Args {
    /// Configuration file (default: $SPEAKER_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay a compressed audio file as notification-sized fragments
    #[arg(long, conflicts_with = "listen")]
    replay: Option<PathBuf>,

    /// Accept one TCP sender on this address (e.g. 0.0.0.0:5750)
    #[arg(long, env = "SPEAKER_LISTEN")]
    listen: Option<String>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Output device name
    #[arg(short, long, env = "SPEAKER_DEVICE")]
    device: Option<String>,

    /// Negotiated MTU for replay (payload = MTU - 3)
    #[arg(long)]
    mtu: Option<u16>,

    /// Pause between replayed fragments in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Container/codec hint for the decoder (mp3, aac, flac, ogg, wav)
    #[arg(long)]
    format: Option<String>,

    /// Buffered bytes required before a decode attempt
    #[arg(long)]
    min_decode_bytes: Option<usize>,

    /// Bytes kept after a successful decode
    #[arg(long)]
    tail_keep_bytes: Option<usize>,

    /// Chunk duration in milliseconds
    #[arg(long)]
    chunk_ms: Option<u32>,

    /// Chunks queued before playback starts
    #[arg(long)]
    prebuffer_chunks: Option<usize>,

    /// Playback queue capacity (0 = unbounded)
    #[arg(long)]
    max_queued_chunks: Option<usize>,

    /// Log level (overrides the config file; RUST_LOG overrides both)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply_overrides(&self, config: &mut TomlConfig) {
        let pipeline = &mut config.pipeline;
        if let Some(v) = self.min_decode_bytes {
            pipeline.min_decode_bytes = v;
        }
        if let Some(v) = self.tail_keep_bytes {
            pipeline.tail_keep_bytes = v;
        }
        if let Some(v) = self.chunk_ms {
            pipeline.chunk_ms = v;
        }
        if let Some(v) = self.prebuffer_chunks {
            pipeline.prebuffer_chunks = v;
        }
        if let Some(v) = self.max_queued_chunks {
            pipeline.max_queued_chunks = v;
        }

        if let Some(device) = &self.device {
            config.output.device = Some(device.clone());
        }

        let transport = &mut config.transport;
        if let Some(mtu) = self.mtu {
            transport.mtu = mtu;
        }
        if let Some(ms) = self.interval_ms {
            transport.fragment_interval_ms = ms;
        }
        if let Some(format) = &self.format {
            transport.format_hint = format.clone();
        }

        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

enum Source {
    Replay(ReplaySource),
    Tcp(TcpSource),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_source) =
        load_config::<TomlConfig>(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);

    speaker_common::logging::init(&config.logging, "speaker_rx")
        .context("Failed to initialize logging")?;

    info!("Starting speaker-rx v{}", env!("CARGO_PKG_VERSION"));
    match &config_source {
        ConfigSource::File(path) => info!("Configuration loaded from {}", path.display()),
        ConfigSource::Defaults => info!("No configuration file found, using defaults"),
    }

    if args.list_devices {
        for name in list_devices().context("Failed to list output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let interval = Duration::from_millis(config.transport.fragment_interval_ms);
    let source = match (&args.replay, &args.listen) {
        (Some(path), _) => Source::Replay(
            ReplaySource::open(path, config.transport.mtu, interval)
                .await
                .context("Failed to open replay file")?,
        ),
        (None, Some(addr)) => Source::Tcp(
            TcpSource::bind(addr)
                .await
                .context("Failed to start TCP listener")?,
        ),
        (None, None) => bail!("Nothing to receive: pass --replay <FILE> or --listen <ADDR>"),
    };

    let decoder = SymphoniaDecoder::new(Some(config.transport.format_hint.clone()));
    let output_settings = config.output.clone();
    let session = Session::start(&config.pipeline, decoder, move || {
        CpalOutput::open(&output_settings)
    })
    .context("Failed to start streaming session")?;

    let ingest = session.ingest();
    let transport = async move {
        match source {
            Source::Replay(replay) => {
                Ok::<TransportSummary, speaker_rx::Error>(replay.run(ingest).await)
            }
            Source::Tcp(tcp) => tcp.run(ingest).await,
        }
    };
    tokio::pin!(transport);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // The session can end on its own (drained, or a fatal output error) while
    // the transport is still waiting on a sender, so watch both from the start
    let mut transport_done = false;
    let mut finish_poll = tokio::time::interval(FINISH_POLL_INTERVAL);
    let mut status = tokio::time::interval(STATUS_INTERVAL);
    loop {
        tokio::select! {
            result = &mut transport, if !transport_done => {
                transport_done = true;
                match result {
                    Ok(summary) => info!(
                        "Input complete ({} fragments, {} bytes), draining playback",
                        summary.fragments, summary.bytes
                    ),
                    Err(e) => warn!("Transport ended with error: {}, playing what arrived", e),
                }
            }
            _ = &mut shutdown => {
                session.shutdown();
                break;
            }
            _ = finish_poll.tick() => {
                if session.is_finished() {
                    if !transport_done {
                        warn!("Session ended before the transport, dropping the input");
                    }
                    break;
                }
            }
            _ = status.tick() => {
                debug!(
                    "Queued chunks={}, buffered bytes={}",
                    session.queued_chunks(),
                    session.buffered_bytes()
                );
            }
        }
    }

    tokio::task::spawn_blocking(move || session.wait())
        .await
        .context("Session join task failed")?
        .context("Playback failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
