//! Error types for target platform operations.

/// Errors that can occur when resolving a target platform.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// The identifier does not name any known platform.
    #[error("unknown platform identifier: '{name}'")]
    UnknownPlatform {
        /// The identifier as given.
        name: String,
    },

    /// The platform is known but has no build support (an unported target).
    #[error("unsupported platform: {platform}")]
    UnsupportedPlatform {
        /// Canonical platform name.
        platform: String,
    },

    /// The pragma dialect name is not recognized.
    #[error("unknown pragma dialect: '{name}' (expected msvc, gnu, or portable)")]
    UnknownDialect {
        /// The dialect as given.
        name: String,
    },
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
