//! Domain-specific error types for vsforge.
//!
//! This module defines `VsforgeError`, a `thiserror`-based enum that
//! provides typed error variants for the failure modes of a build. Steps
//! store these errors in the state bag, while capability traits and the
//! top-level entry points continue to use `anyhow::Result`.
//!
//! `VsforgeError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically at trait boundaries that return `anyhow::Result`.

use std::io;
use std::sync::LazyLock;

use regex::Regex;
use strum::Display;

use crate::sanitize::{sanitize_error_message, sanitize_error_message_with};

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent, user-friendly messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to including the OS-level error message
/// directly (e.g., "I/O error: connection refused").
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Classification of a remote-package deployment failure.
///
/// The `Display` form is the user-facing summary placed in front of the
/// sanitized source URL and cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DeploymentErrorKind {
    #[strum(serialize = "authentication failed when accessing remote source")]
    Authentication,
    #[strum(serialize = "remote source file not found")]
    NotFound,
    #[strum(serialize = "TLS/SSL certificate error accessing remote source")]
    Tls,
    #[strum(serialize = "source file validation error")]
    Validation,
    #[strum(serialize = "insufficient resources for deployment")]
    Resource,
    #[strum(serialize = "network connectivity error accessing remote source")]
    Network,
    #[strum(serialize = "deployment failed")]
    Generic,
}

/// Ordered classification table. The first matching pattern wins.
static DEPLOYMENT_PATTERNS: LazyLock<Vec<(Regex, DeploymentErrorKind)>> = LazyLock::new(|| {
    [
        (r"(?i)\b401\b|unauthori[sz]ed|authentication failed", DeploymentErrorKind::Authentication),
        (r"(?i)\b404\b|not found|no such file", DeploymentErrorKind::NotFound),
        (r"(?i)certificate|x509|\btls\b|\bssl\b", DeploymentErrorKind::Tls),
        (
            r"(?i)invalid ovf|malformed|validation|failed to parse|manifest mismatch",
            DeploymentErrorKind::Validation,
        ),
        (
            r"(?i)insufficient|no space|not enough space|out of space|resource",
            DeploymentErrorKind::Resource,
        ),
        (
            r"(?i)connection refused|connection reset|timed out|timeout|no route to host|network|dial tcp|\beof\b",
            DeploymentErrorKind::Network,
        ),
    ]
    .into_iter()
    .map(|(pattern, kind)| {
        (Regex::new(pattern).expect("deployment error pattern must compile"), kind)
    })
    .collect()
});

impl DeploymentErrorKind {
    /// Classifies the text of an underlying deployment error.
    pub fn classify(text: &str) -> Self {
        DEPLOYMENT_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(text))
            .map(|(_, kind)| *kind)
            .unwrap_or(Self::Generic)
    }
}

/// Domain-specific error type for vsforge.
///
/// Provides typed variants for common failure modes, enabling callers
/// to match on error kinds programmatically rather than parsing error
/// message strings.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VsforgeError {
    /// A validation constraint was violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A build file could not be loaded or parsed, or a step found the
    /// configuration in a state validation should have rejected.
    #[error("configuration error: {0}")]
    Config(String),

    /// A hypervisor driver operation failed.
    #[error("{operation} failed: {message}")]
    Driver {
        /// The driver operation that was attempted (e.g., "clone").
        operation: String,
        /// Human-readable cause reported by the driver.
        message: String,
    },

    /// A remote object the build depends on does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The target VM already exists and `force` was not requested.
    #[error("virtual machine {path} already exists; use the 'force' option to destroy it")]
    AlreadyExists {
        /// Inventory path of the existing VM.
        path: String,
    },

    /// The requested OVF deployment option is not offered by the package.
    #[error(
        "deployment option '{requested}' not found in OVF. Available options: {}",
        .available.join(", ")
    )]
    DeploymentOption {
        /// The deployment option named in the vApp configuration.
        requested: String,
        /// Option names offered by the package, in discovery order.
        available: Vec<String>,
    },

    /// A remote-package deployment failed.
    #[error("{kind} ({url}): {cause}")]
    Deployment {
        /// Classification of the failure.
        kind: DeploymentErrorKind,
        /// Source URL, always with credentials removed.
        url: String,
        /// Underlying cause, sanitized.
        cause: String,
    },

    /// The build was cancelled before or during a step.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred, usually a path.
        context: String,
        /// Human-readable description of the I/O failure, derived from
        /// [`io_error_kind_message`].
        message: String,
        /// The underlying I/O error, preserved for programmatic inspection.
        #[source]
        source: std::io::Error,
    },
}

impl VsforgeError {
    /// Creates an `Io` variant with the `message` field automatically derived
    /// from the `source` via [`io_error_kind_message`].
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }

    /// Creates a `Driver` variant from an operation name and any displayable cause.
    ///
    /// The alternate `{:#}` form is used so that `anyhow` context chains are kept.
    pub fn driver(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Driver {
            operation: operation.into(),
            message: format!("{:#}", cause),
        }
    }

    /// Builds a classified `Deployment` error from the underlying cause.
    ///
    /// `sanitized_url` must already have its password removed. The cause is
    /// classified on its raw text and stored sanitized, with every literal
    /// occurrence of `secrets` redacted as well.
    pub fn deployment(
        sanitized_url: impl Into<String>,
        cause: impl std::fmt::Display,
        secrets: &[&str],
    ) -> Self {
        let raw = format!("{:#}", cause);
        Self::Deployment {
            kind: DeploymentErrorKind::classify(&raw),
            url: sanitized_url.into(),
            cause: sanitize_error_message_with(&raw, secrets),
        }
    }

    /// Returns this error with every string payload passed through
    /// [`sanitize_error_message`].
    ///
    /// Applying this twice yields the same result as applying it once.
    pub fn sanitized(self) -> Self {
        let clean = |s: String| sanitize_error_message(&s);
        match self {
            Self::Validation(msg) => Self::Validation(clean(msg)),
            Self::Config(msg) => Self::Config(clean(msg)),
            Self::Driver { operation, message } => Self::Driver {
                operation,
                message: clean(message),
            },
            Self::NotFound(msg) => Self::NotFound(clean(msg)),
            Self::AlreadyExists { path } => Self::AlreadyExists { path: clean(path) },
            Self::DeploymentOption {
                requested,
                available,
            } => Self::DeploymentOption {
                requested: clean(requested),
                available: available.into_iter().map(clean).collect(),
            },
            Self::Deployment { kind, url, cause } => Self::Deployment {
                kind,
                url: clean(url),
                cause: clean(cause),
            },
            Self::Cancelled(msg) => Self::Cancelled(clean(msg)),
            Self::Io {
                context,
                message,
                source,
            } => Self::Io {
                context: clean(context),
                message: clean(message),
                source,
            },
        }
    }
}
