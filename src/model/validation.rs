use serde::Serialize;

use super::pass::UnifiedPass;

/// Outcome of validating a parsed pass. Always a value, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "messages", rename_all = "snake_case")]
pub enum ValidationResult {
    Success,
    SuccessWithWarnings(Vec<String>),
    Failure(Vec<String>),
}

impl ValidationResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, ValidationResult::Failure(_))
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ValidationResult::SuccessWithWarnings(warnings) => warnings,
            _ => &[],
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            ValidationResult::Failure(errors) => errors,
            _ => &[],
        }
    }

    fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        if !errors.is_empty() {
            ValidationResult::Failure(errors)
        } else if !warnings.is_empty() {
            ValidationResult::SuccessWithWarnings(warnings)
        } else {
            ValidationResult::Success
        }
    }
}

pub const TITLE_REQUIRED: &str = "Pass title is required";
pub const ORGANIZATION_REQUIRED: &str = "Organization name is required";
pub const MISSING_BARCODE: &str = "Pass has no barcode";
pub const MISSING_ARTWORK: &str = "Pass has no logo or icon image";

/// Rules every format shares: required display fields are errors, missing
/// barcode and artwork are warnings.
pub fn validate_common(pass: &UnifiedPass) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if pass.title.trim().is_empty() {
        errors.push(TITLE_REQUIRED.to_string());
    }
    if pass.organization_name.trim().is_empty() {
        errors.push(ORGANIZATION_REQUIRED.to_string());
    }

    if !pass.barcode.is_present() {
        warnings.push(MISSING_BARCODE.to_string());
    }
    if pass.images.logo.is_none() && pass.images.icon.is_none() {
        warnings.push(MISSING_ARTWORK.to_string());
    }

    ValidationResult::from_parts(errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Barcode, BarcodeFormat};
    use bytes::Bytes;

    fn complete_pass() -> UnifiedPass {
        let mut pass = UnifiedPass::new("Boarding", "Acme Air");
        pass.barcode = Barcode {
            message: "M1DOE/JOHN".to_string(),
            format: BarcodeFormat::Pdf417,
            alt_text: None,
        };
        pass.images.icon = Some(Bytes::from_static(b"icon"));
        pass
    }

    #[test]
    fn test_complete_pass_is_success() {
        assert_eq!(validate_common(&complete_pass()), ValidationResult::Success);
    }

    #[test]
    fn test_blank_title_and_organization_fail() {
        let mut pass = complete_pass();
        pass.title = "  ".to_string();
        pass.organization_name = String::new();

        let result = validate_common(&pass);
        assert!(!result.is_success());
        assert_eq!(result.errors(), [TITLE_REQUIRED, ORGANIZATION_REQUIRED]);
    }

    #[test]
    fn test_missing_barcode_and_artwork_warn_twice() {
        let mut pass = complete_pass();
        pass.barcode = Barcode::default();
        pass.images.icon = None;

        let result = validate_common(&pass);
        assert!(result.is_success());
        assert_eq!(result.warnings(), [MISSING_BARCODE, MISSING_ARTWORK]);
    }

    #[test]
    fn test_logo_alone_satisfies_artwork() {
        let mut pass = complete_pass();
        pass.images.icon = None;
        pass.images.logo = Some(Bytes::from_static(b"logo"));

        assert_eq!(validate_common(&pass), ValidationResult::Success);
    }
}
