use crate::backup::compress::{Compressor, CompressorBuilder};
use crate::backup::result_error::result::Result;
use liblzma::stream::{Check, MtStreamBuilder};
use liblzma::write::XzEncoder;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::io::Write;
use std::num::NonZero;
use validator::Validate;

/// Default compression level (balance of speed vs size)
static DEFAULT_COMPRESSION_LEVEL: u32 = 3;
/// Maximum threads to prevent resource exhaustion
static DEFAULT_MAX_PARALLELIZATION: usize = 32;

/// Configuration for XZ (LZMA) compression of backup archives.
#[skip_serializing_none]
#[derive(Clone, Default, Validate, Serialize, Deserialize, Debug)]
pub struct XzConfig {
    /// Compression level (0-9); higher is smaller and slower.
    #[validate(range(min = 0, max = 9))]
    level: Option<u32>,

    /// Number of compression threads; defaults to half the available cores.
    #[validate(range(min = 1))]
    thread: Option<u32>,
}

impl<W: Write> CompressorBuilder<W> for XzConfig {
    fn build_compressor(&self, writer: W) -> Result<Compressor<W>> {
        let level = self.level.unwrap_or(DEFAULT_COMPRESSION_LEVEL);

        let thread = self.thread.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZero::get)
                .map(|core| core / 2)
                .map(|t| t.max(1))
                .map(|t| t.min(DEFAULT_MAX_PARALLELIZATION) as u32)
                .unwrap_or(1)
        });

        tracing::debug!("Creating XZ compressor with level={}, threads={}", level, thread);

        if thread == 1 {
            Ok(XzEncoder::new(writer, level).into())
        } else {
            let stream = MtStreamBuilder::new()
                .preset(level)
                .check(Check::Crc64)
                .threads(thread)
                .encoder()?;
            Ok(XzEncoder::new_stream(writer, stream).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_xz_config_default() {
        let config = XzConfig::default();
        assert!(config.level.is_none());
        assert!(config.thread.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_xz_config_invalid_level() {
        let config = XzConfig {
            level: Some(10),
            thread: Some(1),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_xz_config_invalid_thread() {
        let config = XzConfig {
            level: Some(5),
            thread: Some(0),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_compressor_single_thread() {
        let config = XzConfig {
            level: Some(6),
            thread: Some(1),
        };
        let compressor = config.build_compressor(Cursor::new(Vec::new())).unwrap();
        assert!(matches!(compressor, Compressor::XzEncoder(_)));
    }

    #[test]
    fn test_build_compressor_multi_thread() {
        let config = XzConfig {
            level: Some(6),
            thread: Some(4),
        };
        let compressor = config.build_compressor(Cursor::new(Vec::new())).unwrap();
        assert!(matches!(compressor, Compressor::XzEncoder(_)));
    }

    #[test]
    fn test_build_compressor_auto_thread() {
        let config = XzConfig {
            level: Some(6),
            thread: None,
        };
        let compressor = config.build_compressor(Cursor::new(Vec::new())).unwrap();
        assert!(matches!(compressor, Compressor::XzEncoder(_)));
    }

    #[test]
    fn test_xz_config_serialization() {
        let config = XzConfig {
            level: Some(6),
            thread: Some(4),
        };
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: XzConfig = serde_json::from_str(&serialized).unwrap();

        assert_eq!(config.level, deserialized.level);
        assert_eq!(config.thread, deserialized.thread);
    }
}
