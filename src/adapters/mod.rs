//! Adapter interfaces for external systems.
//!
//! Each external collaborator (blob storage, the encoding utility, the
//! vendor STT service) sits behind a trait so the scheduler owns
//! explicitly constructed clients and tests can substitute fakes.

pub mod encoder;
pub mod object_store;
pub mod stt;

// Re-export the adapter traits and default implementations
pub use encoder::{AudioEncoder, EncodeError, FfmpegEncoder};
pub use object_store::{FsObjectStore, ObjectStore, ObjectStoreError};
pub use stt::{SpeechToText, SttError, VendorSttClient};
