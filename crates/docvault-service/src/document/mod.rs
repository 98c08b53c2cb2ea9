//! Document, version chain, and metadata service.

pub mod service;

pub use service::{AddVersionRequest, CreateDocumentRequest, DocumentService};
