//! Folder hierarchy service.

pub mod service;

pub use service::{CreateFolderRequest, FolderService, MoveFolderRequest};
