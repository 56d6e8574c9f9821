//! Exit code constants for the itinera CLI.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments, configuration or request |
//! | 70 | `PROVIDER_FAILURE` | An upstream provider failed and no fallback applied |

/// Exit codes matching the documented exit code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments, configuration or input file
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Provider failure - an LLM or image provider failed outright
    pub const PROVIDER_FAILURE: ExitCode = ExitCode(70);

    /// Get the numeric exit code value for `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CLI_ARGS.as_i32(), 2);
        assert_eq!(i32::from(ExitCode::PROVIDER_FAILURE), 70);
    }
}
