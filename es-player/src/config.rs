//! Player configuration.
//!
//! Values come from three places, in order of precedence: command line
//! flags, the TOML configuration file and built-in defaults. The file is
//! optional and every key in it is optional:
//!
//! ```toml
//! [stream]
//! codec = "mpeg2"
//! chunk_size = 4096
//!
//! [collator]
//! max_frame_size = 4194304
//! max_start_codes = 1024
//! insert_frame_terminate_code = false
//!
//! [mjpeg]
//! metadata_marker = 0xE3
//! signature = "STMicroelectronics"
//! max_components = 4
//!
//! [decode]
//! buffer_count = 8
//! horizontal_decimation = 1
//! vertical_decimation = 1
//!
//! [logging]
//! log_dir = "logs"
//! retention_days = 7
//! level = "info"
//! ```

use std::path::Path;

use pes_collator::CollatorConfig;
use serde::Deserialize;

use crate::error::StreamError;
use crate::frame_parser::mjpeg::{MjpegConfig, MAX_COMPONENTS};
use crate::types::{Codec, Decimation};

pub const DEFAULT_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_BUFFER_COUNT: usize = 8;
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub stream: StreamSection,
    #[serde(default)]
    pub collator: CollatorSection,
    #[serde(default)]
    pub mjpeg: MjpegSection,
    #[serde(default)]
    pub decode: DecodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct StreamSection {
    pub codec: Option<Codec>,
    pub chunk_size: Option<usize>,
}

/// Overrides applied on top of the codec's collator preset.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct CollatorSection {
    pub max_frame_size: Option<usize>,
    pub max_start_codes: Option<usize>,
    pub insert_frame_terminate_code: Option<bool>,
}

impl CollatorSection {
    pub fn apply(&self, mut config: CollatorConfig) -> CollatorConfig {
        if let Some(size) = self.max_frame_size {
            config.max_frame_size = size;
        }
        if let Some(count) = self.max_start_codes {
            config.max_start_codes = count;
        }
        if let Some(insert) = self.insert_frame_terminate_code {
            config.insert_frame_terminate_code = insert;
        }
        config
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct MjpegSection {
    pub metadata_marker: Option<u8>,
    pub signature: Option<String>,
    pub max_components: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DecodeSection {
    pub buffer_count: Option<usize>,
    pub horizontal_decimation: Option<u8>,
    pub vertical_decimation: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

pub fn load_config(path: &Path) -> Result<ConfigFile, StreamError> {
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|e| StreamError::Config(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Number of decode buffers in the pool.
    pub buffer_count: usize,
    pub decimation: Decimation,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            buffer_count: DEFAULT_BUFFER_COUNT,
            decimation: Decimation::IDENTITY,
        }
    }
}

/// Everything a [`Stream`](crate::stream::Stream) is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub codec: Codec,
    /// Bytes handed to the collator per input call.
    pub chunk_size: usize,
    pub collator: CollatorSection,
    pub mjpeg: MjpegConfig,
    pub decode: DecodeConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            codec: Codec::Mpeg2,
            chunk_size: DEFAULT_CHUNK_SIZE,
            collator: CollatorSection::default(),
            mjpeg: MjpegConfig::default(),
            decode: DecodeConfig::default(),
        }
    }
}

fn check_decimation(factor: u8) -> Result<u8, StreamError> {
    match factor {
        1 | 2 | 4 => Ok(factor),
        _ => Err(StreamError::Config(format!(
            "decimation factor must be 1, 2 or 4 (got {})",
            factor
        ))),
    }
}

impl PlayerConfig {
    /// Build from a configuration file, falling back to defaults.
    pub fn from_file(file: &ConfigFile) -> Result<Self, StreamError> {
        let defaults = MjpegConfig::default();
        let mjpeg = MjpegConfig {
            metadata_marker: file.mjpeg.metadata_marker.unwrap_or(defaults.metadata_marker),
            signature: file.mjpeg.signature.clone().unwrap_or(defaults.signature),
            max_components: file.mjpeg.max_components.unwrap_or(defaults.max_components),
        };

        let config = Self {
            codec: file.stream.codec.unwrap_or(Codec::Mpeg2),
            chunk_size: file.stream.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            collator: file.collator.clone(),
            mjpeg,
            decode: DecodeConfig {
                buffer_count: file.decode.buffer_count.unwrap_or(DEFAULT_BUFFER_COUNT),
                decimation: Decimation {
                    horizontal: check_decimation(file.decode.horizontal_decimation.unwrap_or(1))?,
                    vertical: check_decimation(file.decode.vertical_decimation.unwrap_or(1))?,
                },
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.chunk_size == 0 {
            return Err(StreamError::Config("chunk_size must be positive".to_string()));
        }
        if self.decode.buffer_count == 0 {
            return Err(StreamError::Config("buffer_count must be positive".to_string()));
        }
        if !(1..=MAX_COMPONENTS).contains(&self.mjpeg.max_components) {
            return Err(StreamError::Config(format!(
                "max_components must be between 1 and {}",
                MAX_COMPONENTS
            )));
        }
        Ok(())
    }
}
