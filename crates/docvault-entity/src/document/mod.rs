//! Document, version chain, and metadata entities.

pub mod metadata;
pub mod model;
pub mod status;
pub mod version;

pub use metadata::DocumentMetadata;
pub use model::{CreateDocument, Document};
pub use status::VersionStatus;
pub use version::{DocumentVersion, NewVersion};
