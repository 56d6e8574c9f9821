use std::path::PathBuf;

/// Command-line overrides (highest precedence).
///
/// `None` means "not given on the command line".
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file; disables discovery
    pub config_path: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub model: Option<String>,
    pub evaluator_model: Option<String>,
}
