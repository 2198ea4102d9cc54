//! es-player: collate, parse and decode a PES video elementary stream file.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, warn};

use es_player::config::{
    load_config, ConfigFile, PlayerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_LOG_DIR,
    DEFAULT_RETENTION_DAYS,
};
use es_player::logging;
use es_player::types::Codec;
use es_player::{Stream, StreamError};
use pes_collator::{InputDescriptor, Status};

/// es-player - PES video stream collation and decode
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PES stream file to play
    file: PathBuf,

    /// Video codec carried by the stream
    #[arg(long, value_enum)]
    codec: Option<Codec>,

    /// Bytes fed to the collator per call
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Directory where log files are stored
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Number of days to keep log files
    #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
    log_retention_days: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Explicit path > auto-detect > default
    let config_path = args.config.clone().or_else(|| {
        let default_path = PathBuf::from("es-player.toml");
        default_path.exists().then_some(default_path)
    });
    let file_config = match &config_path {
        Some(path) => match load_config(path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e.into());
            }
        },
        None => ConfigFile::default(),
    };

    // Command line takes precedence over the file.
    let log_dir = if args.log_dir.to_string_lossy() != DEFAULT_LOG_DIR {
        args.log_dir.clone()
    } else {
        PathBuf::from(
            file_config
                .logging
                .log_dir
                .as_deref()
                .unwrap_or(DEFAULT_LOG_DIR),
        )
    };
    let retention_days = if args.log_retention_days != DEFAULT_RETENTION_DAYS {
        args.log_retention_days
    } else {
        file_config
            .logging
            .retention_days
            .unwrap_or(DEFAULT_RETENTION_DAYS)
    };
    logging::init_logging(
        &log_dir,
        retention_days,
        args.verbose,
        file_config.logging.level.as_deref(),
    )?;

    let mut config = PlayerConfig::from_file(&file_config)?;
    if let Some(codec) = args.codec {
        config.codec = codec;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    config.validate()?;

    info!(
        "Playing {} as {} ({} byte chunks, default {})",
        args.file.display(),
        config.codec,
        config.chunk_size,
        DEFAULT_CHUNK_SIZE
    );

    let mut stream = Stream::new(&config);
    let mut file = File::open(&args.file)?;
    let mut chunk = vec![0u8; config.chunk_size];
    let mut offset = 0u64;

    loop {
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        let result = stream.input(&InputDescriptor::default(), &chunk[..read]);
        let status = recover(&mut stream, result)?;
        if !status.is_success() {
            warn!("Input at offset {}: {:?}", offset, status);
        }
        offset += read as u64;
        report(&mut stream);
    }

    let result = stream.drain(false);
    let status = recover(&mut stream, result)?;
    if !status.is_success() {
        warn!("Drain: {:?}", status);
    }
    report(&mut stream);

    let statistics = stream.statistics();
    info!(
        "Done: {} bytes, {} frames collated, {} decoded ({} degraded), {} parse errors",
        offset,
        statistics.collator.frames,
        statistics.decoder.completed,
        statistics.decoder.degraded,
        statistics.parse_errors
    );
    tracing::debug!(?statistics, "Final statistics");

    Ok(())
}

/// Retry after running out of decode buffers.
///
/// Decoded frames are reported, which returns their buffers, and the held
/// frames are resumed for as long as that makes progress.
fn recover(
    stream: &mut Stream,
    mut result: Result<Status, StreamError>,
) -> Result<Status, StreamError> {
    loop {
        match result {
            Err(err) if err.status() == Status::DecodeBufferUnavailable => {
                let held = stream.pending_frames();
                debug!("{}; {} frames held", err, held);
                report(stream);
                result = stream.resume();
                if result.is_err() && stream.pending_frames() >= held {
                    return result;
                }
            }
            other => return other,
        }
    }
}

/// Log and release every frame decoded so far.
fn report(stream: &mut Stream) {
    for frame in stream.take_decoded() {
        let presentation = &frame.presentation;
        tracing::info!(
            pts = ?frame.playback_time,
            key_frame = frame.key_frame,
            quality = ?frame.quality,
            width = presentation.dimensions.width,
            height = presentation.dimensions.height,
            format = ?presentation.pixel_format,
            "Decoded frame"
        );
        stream.release(&frame);
    }
}
