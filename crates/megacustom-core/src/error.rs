//! Error taxonomy shared across the workspace
//!
//! Every fallible operation returns [`Result<T>`], carrying an [`Error`] with
//! a numeric code, a human-readable message, optional details, and optionally
//! the raw error code reported by the vendor SDK. The category is derived
//! from the numeric code range, so the two can never disagree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error categories for MegaCustom operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// No error
    None,
    /// Login, session, 2FA errors
    Authentication,
    /// Connection, timeout errors
    Network,
    /// Local file access errors
    FileSystem,
    /// Cloud API/storage errors
    CloudStorage,
    /// Upload/download errors
    Transfer,
    /// Input validation errors
    Validation,
    /// Config file errors
    Configuration,
    /// Access denied errors
    Permission,
    /// Resource not found
    NotFound,
    /// Resource conflicts
    Conflict,
    /// Storage/bandwidth quota exceeded
    Quota,
    /// Internal/unexpected errors
    Internal,
}

impl ErrorCategory {
    /// Human-readable category name
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCategory::None => "None",
            ErrorCategory::Authentication => "Authentication",
            ErrorCategory::Network => "Network",
            ErrorCategory::FileSystem => "FileSystem",
            ErrorCategory::CloudStorage => "CloudStorage",
            ErrorCategory::Transfer => "Transfer",
            ErrorCategory::Validation => "Validation",
            ErrorCategory::Configuration => "Configuration",
            ErrorCategory::Permission => "Permission",
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::Conflict => "Conflict",
            ErrorCategory::Quota => "Quota",
            ErrorCategory::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Common error codes across MegaCustom
///
/// Ranges: 0 OK; 100-199 auth; 200-299 network; 300-399 filesystem;
/// 400-499 cloud; 500-599 transfer; 600-699 validation; 700-799 config;
/// 800-899 resource (not-found, permission, conflict, quota); 900-999 other.
pub mod codes {
    pub const OK: u16 = 0;

    // Authentication (100-199)
    pub const AUTH_INVALID_CREDENTIALS: u16 = 100;
    pub const AUTH_SESSION_EXPIRED: u16 = 101;
    pub const AUTH_NOT_LOGGED_IN: u16 = 104;

    // Network (200-299)
    pub const NETWORK_DISCONNECTED: u16 = 200;
    pub const NETWORK_TIMEOUT: u16 = 201;

    // File system (300-399)
    pub const FS_FILE_NOT_FOUND: u16 = 300;
    pub const FS_DIRECTORY_NOT_FOUND: u16 = 301;
    pub const FS_ACCESS_DENIED: u16 = 302;
    pub const FS_READ_ERROR: u16 = 306;
    pub const FS_WRITE_ERROR: u16 = 307;

    // Cloud storage (400-499)
    pub const CLOUD_NODE_NOT_FOUND: u16 = 400;
    pub const CLOUD_FOLDER_NOT_FOUND: u16 = 401;
    pub const CLOUD_OVER_QUOTA: u16 = 403;

    // Transfer (500-599)
    pub const TRANSFER_FAILED: u16 = 500;
    pub const TRANSFER_CANCELLED: u16 = 501;

    // Validation (600-699)
    pub const VALIDATION_INVALID_EMAIL: u16 = 600;
    pub const VALIDATION_INVALID_PATH: u16 = 601;
    pub const VALIDATION_INVALID_FORMAT: u16 = 604;

    // Configuration (700-799)
    pub const CONFIG_FILE_NOT_FOUND: u16 = 700;
    pub const CONFIG_PARSE_ERROR: u16 = 701;

    // Resources (800-899)
    pub const NOT_FOUND: u16 = 800;
    pub const PERMISSION_DENIED: u16 = 825;
    pub const CONFLICT: u16 = 850;
    pub const QUOTA_EXCEEDED: u16 = 875;

    // Other (900-999)
    pub const CANCELLED: u16 = 900;
    pub const UNKNOWN_ERROR: u16 = 999;
}

/// Category derived from the numeric code range
pub fn category_for_code(code: u16) -> ErrorCategory {
    match code {
        0 => ErrorCategory::None,
        100..=199 => ErrorCategory::Authentication,
        200..=299 => ErrorCategory::Network,
        300..=399 => ErrorCategory::FileSystem,
        400..=499 => ErrorCategory::CloudStorage,
        500..=599 => ErrorCategory::Transfer,
        600..=699 => ErrorCategory::Validation,
        700..=799 => ErrorCategory::Configuration,
        800..=824 => ErrorCategory::NotFound,
        825..=849 => ErrorCategory::Permission,
        850..=874 => ErrorCategory::Conflict,
        875..=899 => ErrorCategory::Quota,
        _ => ErrorCategory::Internal,
    }
}

/// Detailed error information
///
/// The `(category, code, message, details)` tuple surfaced over every
/// subsystem boundary. `vendor_code` carries the raw SDK error when the
/// failure originated in the cloud library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    code: u16,
    message: String,
    details: Option<String>,
    vendor_code: Option<i64>,
}

impl Error {
    /// Create an error with code and message
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            vendor_code: None,
        }
    }

    /// Attach additional details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach the underlying vendor SDK error code
    pub fn with_vendor_code(mut self, vendor_code: i64) -> Self {
        self.vendor_code = Some(vendor_code);
        self
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        category_for_code(self.code)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn vendor_code(&self) -> Option<i64> {
        self.vendor_code
    }

    // --- Factories for common errors ---

    pub fn not_logged_in() -> Self {
        Self::new(codes::AUTH_NOT_LOGGED_IN, "Not logged in")
    }

    pub fn session_expired() -> Self {
        Self::new(codes::AUTH_SESSION_EXPIRED, "Session expired")
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::new(codes::FS_FILE_NOT_FOUND, "File not found").with_details(path)
    }

    pub fn node_not_found(path: impl Into<String>) -> Self {
        Self::new(codes::CLOUD_NODE_NOT_FOUND, "Cloud node not found").with_details(path)
    }

    pub fn folder_not_found(path: impl Into<String>) -> Self {
        Self::new(codes::CLOUD_FOLDER_NOT_FOUND, "Cloud folder not found").with_details(path)
    }

    pub fn transfer_failed(reason: impl Into<String>) -> Self {
        Self::new(codes::TRANSFER_FAILED, "Transfer failed").with_details(reason)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(codes::VALIDATION_INVALID_FORMAT, message)
    }

    /// A named resource (account, profile, mapping, task, ...) does not exist
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(codes::NOT_FOUND, "Resource not found").with_details(resource)
    }

    pub fn cancelled() -> Self {
        Self::new(codes::CANCELLED, "Operation cancelled")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::UNKNOWN_ERROR, message)
    }

    pub fn io(context: impl Into<String>, err: &std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => codes::FS_FILE_NOT_FOUND,
            std::io::ErrorKind::PermissionDenied => codes::FS_ACCESS_DENIED,
            _ => codes::FS_READ_ERROR,
        };
        Self::new(code, context).with_details(err.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category(), self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code_ranges() {
        assert_eq!(category_for_code(0), ErrorCategory::None);
        assert_eq!(category_for_code(104), ErrorCategory::Authentication);
        assert_eq!(category_for_code(201), ErrorCategory::Network);
        assert_eq!(category_for_code(300), ErrorCategory::FileSystem);
        assert_eq!(category_for_code(400), ErrorCategory::CloudStorage);
        assert_eq!(category_for_code(500), ErrorCategory::Transfer);
        assert_eq!(category_for_code(604), ErrorCategory::Validation);
        assert_eq!(category_for_code(701), ErrorCategory::Configuration);
        assert_eq!(category_for_code(codes::NOT_FOUND), ErrorCategory::NotFound);
        assert_eq!(
            category_for_code(codes::PERMISSION_DENIED),
            ErrorCategory::Permission
        );
        assert_eq!(category_for_code(codes::CONFLICT), ErrorCategory::Conflict);
        assert_eq!(category_for_code(codes::QUOTA_EXCEEDED), ErrorCategory::Quota);
        assert_eq!(category_for_code(900), ErrorCategory::Internal);
        assert_eq!(category_for_code(999), ErrorCategory::Internal);
    }

    #[test]
    fn test_not_found_factory() {
        let err = Error::not_found("account 42");
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(err.to_string(), "[NotFound] Resource not found (account 42)");
    }

    #[test]
    fn test_display() {
        let err = Error::node_not_found("/docs/report.pdf");
        assert_eq!(
            err.to_string(),
            "[CloudStorage] Cloud node not found (/docs/report.pdf)"
        );

        let err = Error::new(codes::NETWORK_TIMEOUT, "Request timed out");
        assert_eq!(err.to_string(), "[Network] Request timed out");
    }

    #[test]
    fn test_vendor_code_passthrough() {
        let err = Error::transfer_failed("rate limited").with_vendor_code(-4);
        assert_eq!(err.vendor_code(), Some(-4));
        assert_eq!(err.category(), ErrorCategory::Transfer);
    }

    #[test]
    fn test_io_error_mapping() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::io("reading source", &io);
        assert_eq!(err.code(), codes::FS_FILE_NOT_FOUND);
        assert_eq!(err.category(), ErrorCategory::FileSystem);
    }
}
