//! Closed permission and resource enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use docvault_core::AppError;

/// Kind of resource a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A document.
    Document,
    /// A folder. Only folder grants participate in inheritance.
    Folder,
}

impl ResourceType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Folder => "folder",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "folder" => Ok(Self::Folder),
            _ => Err(AppError::validation(format!(
                "Invalid resource type: '{s}'. Expected one of: document, folder"
            ))),
        }
    }
}

/// Permission a grant confers on its resource.
///
/// `Admin` subsumes every other type on the same resource; no other pair
/// of types is related.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PermissionType {
    /// View the resource.
    Read,
    /// Modify the resource.
    Write,
    /// Delete the resource.
    Delete,
    /// Create, rename, and move sub-folders.
    ManageFolders,
    /// Full control.
    Admin,
}

impl PermissionType {
    /// Every permission type.
    pub const ALL: [PermissionType; 5] = [
        Self::Read,
        Self::Write,
        Self::Delete,
        Self::ManageFolders,
        Self::Admin,
    ];

    /// Whether holding `self` satisfies a requirement for `required`.
    pub fn satisfies(self, required: PermissionType) -> bool {
        self == required || self == Self::Admin
    }

    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::ManageFolders => "manage_folders",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PermissionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "delete" => Ok(Self::Delete),
            "manage_folders" => Ok(Self::ManageFolders),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::validation(format!(
                "Invalid permission type: '{s}'. \
                 Expected one of: read, write, delete, manage_folders, admin"
            ))),
        }
    }
}
