//! Transform (hardware decode) service contract and a loopback implementation.
//!
//! Commands are submitted synchronously and complete asynchronously: every
//! accepted command yields a [`TransformCompletion`] on the channel the
//! service was created with, carrying the handle returned by `submit`.

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::trace;

use crate::codec::command::DecodeCommand;
use crate::error::TransformError;

/// Status word of a clean decode.
pub const TRANSFORM_STATUS_OK: u32 = 0;

/// Correlates a completion with its submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformHandle(pub u64);

impl std::fmt::Display for TransformHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Values the transform reports back besides its status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeReturnParameters {
    /// Coded bytes the decoder consumed.
    pub bytes_consumed: usize,
    /// Macroblocks reported as damaged.
    pub error_macroblocks: u32,
}

/// Completion posted by the transform service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformCompletion {
    pub handle: TransformHandle,
    /// [`TRANSFORM_STATUS_OK`] or a hardware error code.
    pub status: u32,
    pub return_parameters: Option<DecodeReturnParameters>,
}

impl TransformCompletion {
    pub fn is_ok(&self) -> bool {
        self.status == TRANSFORM_STATUS_OK
    }
}

/// A decode engine.
pub trait TransformService: Send {
    /// Queue a decode; the completion arrives later on the service's channel.
    fn submit(&mut self, command: &DecodeCommand) -> Result<TransformHandle, TransformError>;
}

/// Channel pair connecting a service to its consumer.
pub fn completion_channel() -> (Sender<TransformCompletion>, Receiver<TransformCompletion>) {
    mpsc::channel()
}

/// Service that validates each command and completes it immediately.
#[derive(Debug)]
pub struct LoopbackTransform {
    completions: Sender<TransformCompletion>,
    next_handle: u64,
    hardware_error: Option<u32>,
}

impl LoopbackTransform {
    pub fn new(completions: Sender<TransformCompletion>) -> Self {
        Self {
            completions,
            next_handle: 1,
            hardware_error: None,
        }
    }

    /// Report `code` on every following completion (`None` to stop).
    pub fn set_hardware_error(&mut self, code: Option<u32>) {
        self.hardware_error = code;
    }

    fn validate(command: &DecodeCommand) -> Result<(), TransformError> {
        if command.source_length == 0 {
            return Err(TransformError::Rejected("empty source".to_string()));
        }
        if command.source_offset + command.source_length > command.source.len() {
            return Err(TransformError::Rejected(format!(
                "source range {}+{} outside {} bytes",
                command.source_offset,
                command.source_length,
                command.source.len()
            )));
        }
        if command.destinations.is_empty() {
            return Err(TransformError::Rejected("no destination planes".to_string()));
        }
        if command.dimensions.is_empty() {
            return Err(TransformError::Rejected("empty picture".to_string()));
        }
        Ok(())
    }
}

impl TransformService for LoopbackTransform {
    fn submit(&mut self, command: &DecodeCommand) -> Result<TransformHandle, TransformError> {
        Self::validate(command)?;

        let handle = TransformHandle(self.next_handle);
        self.next_handle += 1;

        let status = self.hardware_error.unwrap_or(TRANSFORM_STATUS_OK);
        let return_parameters = DecodeReturnParameters {
            bytes_consumed: command.source_length,
            error_macroblocks: if status == TRANSFORM_STATUS_OK { 0 } else { 1 },
        };
        trace!("Transform {} completes with status {:#x}", handle, status);

        self.completions
            .send(TransformCompletion {
                handle,
                status,
                return_parameters: Some(return_parameters),
            })
            .map_err(|_| TransformError::Disconnected)?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::codec::command::{AddressingMode, CodecParameters, PlaneDestination};
    use crate::decode::buffer::ComponentRole;
    use crate::frame_parser::mjpeg::FieldIndicator;
    use crate::types::{Decimation, Dimensions, PixelFormat};

    fn command(source_offset: usize, source_length: usize) -> DecodeCommand {
        DecodeCommand {
            source: Bytes::from_static(&[0xFF, 0xD8, 0x00, 0x11, 0xFF, 0xD9]),
            source_offset,
            source_length,
            dimensions: Dimensions::new(16, 16),
            pixel_format: PixelFormat::Monochrome,
            output_dimensions: Dimensions::new(16, 16),
            addressing_mode: AddressingMode::Raster,
            destinations: vec![PlaneDestination {
                role: ComponentRole::PrimaryLuma,
                buffer_index: 0,
                offset: 0,
                stride: 16,
                size: 256,
            }],
            decimation: Decimation::IDENTITY,
            codec: CodecParameters::Mjpeg {
                components: Vec::new(),
                field: FieldIndicator::Progressive,
            },
        }
    }

    #[test]
    fn test_loopback_completes_in_order() {
        let (sender, receiver) = completion_channel();
        let mut transform = LoopbackTransform::new(sender);

        let first = transform.submit(&command(0, 6)).unwrap();
        let second = transform.submit(&command(2, 4)).unwrap();
        assert_eq!(first, TransformHandle(1));
        assert_eq!(second, TransformHandle(2));

        let completion = receiver.try_recv().unwrap();
        assert_eq!(completion.handle, first);
        assert!(completion.is_ok());
        assert_eq!(
            completion.return_parameters.map(|p| p.bytes_consumed),
            Some(6)
        );
        assert_eq!(receiver.try_recv().unwrap().handle, second);
    }

    #[test]
    fn test_loopback_validation() {
        let (sender, receiver) = completion_channel();
        let mut transform = LoopbackTransform::new(sender);

        assert!(matches!(
            transform.submit(&command(0, 0)),
            Err(TransformError::Rejected(_))
        ));
        assert!(matches!(
            transform.submit(&command(4, 4)),
            Err(TransformError::Rejected(_))
        ));
        let mut no_planes = command(0, 6);
        no_planes.destinations.clear();
        assert!(transform.submit(&no_planes).is_err());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_loopback_hardware_error() {
        let (sender, receiver) = completion_channel();
        let mut transform = LoopbackTransform::new(sender);
        transform.set_hardware_error(Some(0x8000_0001));
        transform.submit(&command(0, 6)).unwrap();

        let completion = receiver.try_recv().unwrap();
        assert!(!completion.is_ok());
        assert_eq!(completion.status, 0x8000_0001);

        transform.set_hardware_error(None);
        transform.submit(&command(0, 6)).unwrap();
        assert!(receiver.try_recv().unwrap().is_ok());
    }

    #[test]
    fn test_loopback_disconnected() {
        let (sender, receiver) = completion_channel();
        let mut transform = LoopbackTransform::new(sender);
        drop(receiver);
        assert_eq!(
            transform.submit(&command(0, 6)),
            Err(TransformError::Disconnected)
        );
    }
}
