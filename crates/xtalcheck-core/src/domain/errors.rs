use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CheckResult<T> = Result<T, CheckError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckErrorCategory {
    InputValidation,
    StoreConnectivity,
    Comparator,
    Sink,
    Internal,
}

impl CheckErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidation => 2,
            Self::StoreConnectivity => 3,
            Self::Comparator | Self::Sink => 4,
            Self::Internal => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::InputValidation => "InputValidation",
            Self::StoreConnectivity => "StoreConnectivity",
            Self::Comparator => "Comparator",
            Self::Sink => "Sink",
            Self::Internal => "Internal",
        }
    }
}

/// Run-fatal error carrying a stable diagnostic code alongside the category.
///
/// Per-pair and per-id failures inside a batch never surface as `CheckError`;
/// they are logged and skipped at the call site. Only store-level failures at
/// the start of a run (and misconfiguration) terminate the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckError {
    category: CheckErrorCategory,
    code: &'static str,
    message: String,
}

impl CheckError {
    pub fn new(
        category: CheckErrorCategory,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn input_validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(CheckErrorCategory::InputValidation, code, message)
    }

    pub fn store_connectivity(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(CheckErrorCategory::StoreConnectivity, code, message)
    }

    pub fn comparator(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(CheckErrorCategory::Comparator, code, message)
    }

    pub fn sink(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(CheckErrorCategory::Sink, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(CheckErrorCategory::Internal, code, message)
    }

    pub const fn category(&self) -> CheckErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.code, self.message)
    }
}

impl Display for CheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.label(),
            self.code,
            self.message
        )
    }
}

impl Error for CheckError {}

#[cfg(test)]
mod tests {
    use super::{CheckError, CheckErrorCategory};

    #[test]
    fn exit_codes_are_stable_per_category() {
        let cases = [
            (CheckErrorCategory::InputValidation, 2),
            (CheckErrorCategory::StoreConnectivity, 3),
            (CheckErrorCategory::Comparator, 4),
            (CheckErrorCategory::Sink, 4),
            (CheckErrorCategory::Internal, 5),
        ];

        for (category, exit_code) in cases {
            assert_eq!(category.exit_code(), exit_code);
        }
    }

    #[test]
    fn diagnostic_line_includes_code_and_message() {
        let error = CheckError::store_connectivity("STORE.CATALOG", "catalog unreachable");
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [STORE.CATALOG] catalog unreachable"
        );
        assert_eq!(error.exit_code(), 3);
    }
}
