//! Subset of Apple's `pass.json` consumed during import

use serde::Deserialize;
use serde_json::Value;

use crate::model::{FieldSection, PassField};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PassJson {
    pub description: Option<String>,
    pub organization_name: Option<String>,
    pub serial_number: Option<String>,
    pub logo_text: Option<String>,
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
    pub label_color: Option<String>,
    pub relevant_date: Option<String>,
    pub expiration_date: Option<String>,
    pub voided: Option<bool>,
    pub barcodes: Vec<BarcodeJson>,
    /// Pre-iOS 9 single barcode
    pub barcode: Option<BarcodeJson>,
    pub boarding_pass: Option<PassStructure>,
    pub coupon: Option<PassStructure>,
    pub event_ticket: Option<PassStructure>,
    pub store_card: Option<PassStructure>,
    pub generic: Option<PassStructure>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BarcodeJson {
    pub format: Option<String>,
    pub message: Option<String>,
    pub alt_text: Option<String>,
}

/// Field layout shared by the five pass styles
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PassStructure {
    pub transit_type: Option<String>,
    pub header_fields: Vec<FieldJson>,
    pub primary_fields: Vec<FieldJson>,
    pub secondary_fields: Vec<FieldJson>,
    pub auxiliary_fields: Vec<FieldJson>,
    pub back_fields: Vec<FieldJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FieldJson {
    pub key: String,
    pub label: Option<String>,
    pub value: Value,
}

impl FieldJson {
    /// Field values are strings, numbers or dates; everything becomes text
    pub fn value_text(&self) -> Option<String> {
        match &self.value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl PassStructure {
    pub fn sections(&self) -> [(FieldSection, &[FieldJson]); 5] {
        [
            (FieldSection::Header, self.header_fields.as_slice()),
            (FieldSection::Primary, self.primary_fields.as_slice()),
            (FieldSection::Secondary, self.secondary_fields.as_slice()),
            (FieldSection::Auxiliary, self.auxiliary_fields.as_slice()),
            (FieldSection::Back, self.back_fields.as_slice()),
        ]
    }

    /// Linear lookup by key over every section. Keys match case-insensitively;
    /// the first alias that hits wins.
    pub fn lookup(&self, aliases: &[&str]) -> Option<String> {
        aliases.iter().find_map(|alias| {
            self.sections()
                .into_iter()
                .flat_map(|(_, fields)| fields.iter())
                .find(|field| field.key.eq_ignore_ascii_case(alias))
                .and_then(FieldJson::value_text)
        })
    }

    pub fn flatten(&self) -> Vec<PassField> {
        self.sections()
            .into_iter()
            .flat_map(|(section, fields)| {
                fields.iter().filter_map(move |field| {
                    Some(PassField {
                        section,
                        key: field.key.clone(),
                        label: field.label.clone(),
                        value: field.value_text()?,
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_pass_json() {
        let json = r#"{
            "formatVersion": 1,
            "organizationName": "Coffee Co",
            "storeCard": {
                "primaryFields": [{ "key": "balance", "label": "Balance", "value": 21.5 }]
            }
        }"#;

        let pass: PassJson = serde_json::from_str(json).unwrap();
        assert_eq!(pass.organization_name.as_deref(), Some("Coffee Co"));
        assert!(pass.barcodes.is_empty());

        let card = pass.store_card.unwrap();
        assert_eq!(card.lookup(&["BALANCE"]).as_deref(), Some("21.5"));
        assert_eq!(card.lookup(&["points"]), None);
    }

    #[test]
    fn test_lookup_prefers_first_alias() {
        let structure: PassStructure = serde_json::from_str(
            r#"{
                "headerFields": [{ "key": "group", "value": "B" }],
                "backFields": [{ "key": "boardingGroup", "value": "A" }]
            }"#,
        )
        .unwrap();

        assert_eq!(structure.lookup(&["boardingGroup", "group"]).as_deref(), Some("A"));
    }

    #[test]
    fn test_flatten_keeps_section_order_and_skips_nulls() {
        let structure: PassStructure = serde_json::from_str(
            r#"{
                "backFields": [{ "key": "terms", "value": "No refunds" }],
                "headerFields": [{ "key": "gate", "label": "Gate", "value": "B7" }],
                "auxiliaryFields": [{ "key": "empty", "value": null }]
            }"#,
        )
        .unwrap();

        let fields = structure.flatten();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].section, FieldSection::Header);
        assert_eq!(fields[0].label.as_deref(), Some("Gate"));
        assert_eq!(fields[1].key, "terms");
    }
}
