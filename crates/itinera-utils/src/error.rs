use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::exit_codes::ExitCode;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `ItineraError` is the umbrella error returned by itinera library operations.
/// The orchestration components themselves rarely surface it: the resilient
/// caller, provider chain and refinement loop all degrade to a fallback value
/// instead. It shows up at the edges, where configuration is loaded, requests
/// are validated and the CLI reports a failure.
///
/// # Error Categories
///
/// | Category | Description |
/// |----------|-------------|
/// | `Configuration` | Configuration file, environment or CLI argument errors |
/// | `LlmIntegration` | Chat-completion backend failures |
/// | `ImageProviders` | Image search provider failures |
/// | `FileSystem` | Cache and file I/O errors |
/// | `Validation` | Malformed requests |
///
/// Use [`display_for_user()`](Self::display_for_user) for formatted output and
/// [`to_exit_code()`](Self::to_exit_code) to map the error to a CLI exit code.
#[derive(Error, Debug)]
pub enum ItineraError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Image provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Trait for errors that can provide user-friendly messages and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    LlmIntegration,
    ImageProviders,
    FileSystem,
    ResourceLimits,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::LlmIntegration => write!(f, "LLM Integration"),
            Self::ImageProviders => write!(f, "Image Providers"),
            Self::FileSystem => write!(f, "File System"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Validation => write!(f, "Validation"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
            Self::ValidationFailed { errors, .. } => format!(
                "Configuration validation failed with {} errors: {}",
                errors.len(),
                errors.join(", ")
            ),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with optional [defaults], [llm], [retry], [images] and [refinement] sections."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' configuration option has specific format requirements."
            )),
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "itinera searches for .itinera/config.toml starting from the current directory upward."
                    .to_string(),
            ),
            Self::ValidationFailed { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax using a TOML validator".to_string(),
                "Remove unknown keys from the configuration file".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "retry.max_attempts" | "images.attempts" | "refinement.max_attempts" => {
                    vec!["Use a positive integer value".to_string()]
                }
                "refinement.acceptance_threshold" => {
                    vec!["Use an integer between 1 and 10".to_string()]
                }
                "images.providers" => {
                    vec!["Use 'pixabay' and/or 'unsplash' as provider names".to_string()]
                }
                _ => vec!["Check the documentation for valid values".to_string()],
            },
            Self::NotFound { path } => vec![
                format!("Create the configuration file at {path}"),
                "Omit --config to use discovery and built-in defaults".to_string(),
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Pass an explicit path with --config".to_string(),
                "Set ITINERA_HOME to the directory holding config.toml".to_string(),
            ],
            Self::ValidationFailed { errors, .. } => errors
                .iter()
                .map(|e| format!("Fix: {e}"))
                .collect(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors that can occur during LLM backend operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, request build)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Response arrived but could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Authentication, configuration and unsupported-feature failures are
    /// reported as permanent. This only tags logs; retry loops still spend
    /// their full attempt budget on them.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::ProviderQuota(_)
                | Self::ProviderOutage(_)
                | Self::Timeout { .. }
                | Self::MalformedResponse(_)
        )
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => format!("LLM invocation timed out after {duration:?}"),
            Self::MalformedResponse(msg) => format!("LLM response could not be parsed: {msg}"),
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("Unsupported LLM feature: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) => Some(
                "Configuration errors indicate missing or invalid LLM provider settings."
                    .to_string(),
            ),
            Self::ProviderQuota(_) | Self::ProviderOutage(_) | Self::Timeout { .. } => Some(
                "Transient provider failures are retried with exponential backoff before the fallback is used."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) => vec![
                "Verify network connectivity to the provider endpoint".to_string(),
                "Try running with --verbose to see detailed error information".to_string(),
            ],
            Self::ProviderAuth(_) => vec![
                "Check that the API key environment variable named by llm.api_key_env is set"
                    .to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Self::ProviderQuota(_) | Self::ProviderOutage(_) => vec![
                "Wait a few minutes and try again".to_string(),
                "Check the provider's status page and usage dashboard".to_string(),
            ],
            Self::Timeout { .. } => {
                vec!["Increase llm.timeout_secs in .itinera/config.toml".to_string()]
            }
            Self::MalformedResponse(_) => {
                vec!["Confirm the endpoint speaks the chat-completions protocol".to_string()]
            }
            Self::Misconfiguration(_) | Self::Unsupported(_) => {
                vec!["Review the [llm] section of .itinera/config.toml".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::ProviderQuota(_) => ErrorCategory::ResourceLimits,
            _ => ErrorCategory::LlmIntegration,
        }
    }
}

/// Errors raised by a single image provider query
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Query timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Missing credentials for {provider}: set {env_var}")]
    MissingCredentials { provider: String, env_var: String },
}

impl UserFriendlyError for ProviderError {
    fn user_message(&self) -> String {
        match self {
            Self::MissingCredentials { provider, env_var } => {
                format!("Image provider '{provider}' has no API key ({env_var} is unset)")
            }
            other => format!("Image search failed: {other}"),
        }
    }

    fn context(&self) -> Option<String> {
        Some(
            "Image lookups fall back to a placeholder when every provider fails, so itineraries are still produced."
                .to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::MissingCredentials { env_var, .. } => {
                vec![format!("Export {env_var} or remove the provider from images.providers")]
            }
            Self::Status { status: 429, .. } => {
                vec!["Lower images.requests_per_second".to_string()]
            }
            _ => vec!["Try running with --verbose to see provider responses".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingCredentials { .. } => ErrorCategory::Configuration,
            _ => ErrorCategory::ImageProviders,
        }
    }
}

/// Result cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid cache kind '{kind}': use lowercase letters, digits, '-' or '_'")]
    InvalidKind { kind: String },

    #[error("Canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("Cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl UserFriendlyError for CacheError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("Cache failures never abort a request; the result is recomputed instead.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Io(_) => vec![
                "Check that defaults.cache_dir is writable".to_string(),
                "Delete the cache directory to start fresh".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidKind { .. } | Self::Canonicalization(_) => ErrorCategory::Validation,
            Self::Io(_) | Self::Serialization(_) => ErrorCategory::FileSystem,
        }
    }
}

impl UserFriendlyError for ItineraError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Llm(e) => e.user_message(),
            Self::Provider(e) => e.user_message(),
            Self::Cache(e) => e.user_message(),
            Self::Io(e) => format!("File system operation failed: {e}"),
            Self::InvalidRequest(msg) => format!("Request is invalid: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Llm(e) => e.context(),
            Self::Provider(e) => e.context(),
            Self::Cache(e) => e.context(),
            Self::Io(_) => None,
            Self::InvalidRequest(_) => {
                Some("A travel request needs a non-empty city and at least one day.".to_string())
            }
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Llm(e) => e.suggestions(),
            Self::Provider(e) => e.suggestions(),
            Self::Cache(e) => e.suggestions(),
            Self::Io(_) => vec!["Check file permissions and available disk space".to_string()],
            Self::InvalidRequest(_) => {
                vec!["Check the city and days fields of the input file".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Llm(e) => e.category(),
            Self::Provider(e) => e.category(),
            Self::Cache(e) => e.category(),
            Self::Io(_) => ErrorCategory::FileSystem,
            Self::InvalidRequest(_) => ErrorCategory::Validation,
        }
    }
}

impl ItineraError {
    /// Get a user-friendly error message with context and actionable suggestions.
    ///
    /// Output is passed through [`redact_error_message`](crate::redaction::redact_error_message)
    /// so API keys embedded in provider errors never reach the terminal.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        crate::redaction::redact_error_message(&output)
    }

    /// Map this error to the CLI exit code table.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::InvalidRequest(_) => ExitCode::CLI_ARGS,
            Self::Llm(_) | Self::Provider(_) => ExitCode::PROVIDER_FAILURE,
            Self::Cache(_) | Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}
