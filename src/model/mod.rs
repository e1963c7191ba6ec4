//! Unified pass representation shared by every import format

mod pass;
mod validation;

pub use pass::{
    Barcode, BarcodeFormat, FieldSection, ImageSlot, PassColors, PassField, PassImages,
    PassType, TypeSpecificData, UnifiedPass, generate_pass_id, normalize_color,
};
pub use validation::{
    MISSING_ARTWORK, MISSING_BARCODE, ORGANIZATION_REQUIRED, TITLE_REQUIRED, ValidationResult,
    validate_common,
};
