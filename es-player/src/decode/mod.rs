//! Decode-side collaborators: buffer provision and the transform service.

pub mod buffer;
pub mod transform;

pub use buffer::{ComponentRole, DecodeBuffer, DecodeBufferPool, DecodeBufferProvider};
pub use transform::{LoopbackTransform, TransformCompletion, TransformHandle, TransformService};
