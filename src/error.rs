//! Process exit codes and structured error output.

use serde::Serialize;

use crate::scanner::CatalogError;

/// Exit codes of the `asmdupe` binary.
///
/// - 0: analysis finished and found duplicates
/// - 1: unexpected failure
/// - 2: analysis finished without duplicates
/// - 3: duplicate removal finished with failures
/// - 130: interrupted by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NoDuplicates = 2,
    PartialSuccess = 3,
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code printed in error messages.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "AD000",
            Self::GeneralError => "AD001",
            Self::NoDuplicates => "AD002",
            Self::PartialSuccess => "AD003",
            Self::Interrupted => "AD130",
        }
    }

    /// Exit code for an error that ended the run.
    ///
    /// Interrupts are recognised anywhere in the error chain.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        let interrupted = err
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<CatalogError>(), Some(CatalogError::Interrupted)));
        if interrupted {
            Self::Interrupted
        } else {
            Self::GeneralError
        }
    }
}

/// Error report printed on stderr with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// e.g. `AD001`
    pub code: String,
    pub exit_code: i32,
    pub message: String,
    pub interrupted: bool,
}

impl StructuredError {
    /// Build a report from an error and the exit code it maps to.
    ///
    /// The message includes the whole context chain.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::NoDuplicates.as_i32(), 2);
        assert_eq!(ExitCode::PartialSuccess.as_i32(), 3);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
        assert_eq!(ExitCode::Interrupted.code_prefix(), "AD130");
    }

    #[test]
    fn test_interrupt_found_through_context() {
        let err: anyhow::Result<()> = Err(CatalogError::Interrupted).context("Catalog scan failed");
        let err = err.unwrap_err();
        assert_eq!(ExitCode::for_error(&err), ExitCode::Interrupted);

        let other = anyhow::anyhow!("boom");
        assert_eq!(ExitCode::for_error(&other), ExitCode::GeneralError);
    }

    #[test]
    fn test_structured_error_json() {
        let err = anyhow::anyhow!("root missing").context("Cannot open analysis root");
        let structured = StructuredError::new(&err, ExitCode::GeneralError);
        let json = serde_json::to_value(&structured).unwrap();
        assert_eq!(json["code"], "AD001");
        assert_eq!(json["exit_code"], 1);
        assert_eq!(json["message"], "Cannot open analysis root: root missing");
        assert_eq!(json["interrupted"], false);
    }
}
