//! Core types for document embedding: documents, configuration, credentials,
//! devices, the backend traits and text composition.

pub mod compose;
pub mod config;
pub mod device;
pub mod error;
pub mod secret;
pub mod traits;
pub mod types;

pub use compose::TextComposer;
pub use config::{BackendConfig, BackendKey, DocumentEmbedderConfig, Settings, TextEmbedderConfig};
pub use device::{ComponentDevice, Device, DeviceMap};
pub use error::{Error, Result};
pub use secret::Secret;
pub use traits::{BackendFactory, EmbeddingBackend};
pub use types::Document;
