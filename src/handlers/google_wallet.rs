//! Google Wallet JSON exports: a `class` (template) and an `object` (instance)
//!
//! Two layouts are accepted:
//!
//! - `{"class": {...}, "object": {...}}`
//! - the save-link payload `{"payload": {"flightClasses": [...], "flightObjects": [...]}}`
//!
//! Class-level and object-level data are merged into the same [`UnifiedPass`]
//! shape the PKPass handler produces.

use serde_json::{Map, Value};
use std::io::Read;
use tracing::debug;

use super::dates::parse_timestamp;
use super::traits::{HandlerError, HandlerKind, PassFormatHandler};
use super::types::ImportMetadata;
use crate::config::IngestConfig;
use crate::model::{
    Barcode, BarcodeFormat, FieldSection, PassColors, PassField, PassImages, PassType,
    TypeSpecificData, UnifiedPass, ValidationResult, generate_pass_id, normalize_color,
    validate_common,
};

const FORMAT_NAME: &str = "GoogleWallet";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone)]
pub struct GoogleWalletHandler {
    /// Bytes read when sniffing content
    probe_limit: u64,
    max_document_bytes: u64,
}

impl GoogleWalletHandler {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            probe_limit: config.mark_limit.as_u64(),
            max_document_bytes: config.max_archive_bytes.as_u64(),
        }
    }
}

/// Class/object pair pulled out of either accepted layout
#[derive(Debug)]
struct WalletPair<'a> {
    class: &'a Map<String, Value>,
    object: &'a Map<String, Value>,
    /// Vertical named by the payload key (`flight`, `eventTicket`, ...)
    vertical: Option<&'a str>,
}

fn empty_map() -> &'static Map<String, Value> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    EMPTY.get_or_init(Map::new)
}

fn extract_pair(doc: &Value) -> Option<WalletPair<'_>> {
    let root = doc.as_object()?;

    if let (Some(class), Some(object)) = (
        root.get("class").and_then(Value::as_object),
        root.get("object").and_then(Value::as_object),
    ) {
        return Some(WalletPair {
            class,
            object,
            vertical: None,
        });
    }

    let payload = root.get("payload")?.as_object()?;
    payload.iter().find_map(|(key, value)| {
        let vertical = key.strip_suffix("Objects")?;
        let object = value.as_array()?.first()?.as_object()?;
        let class = payload
            .get(&format!("{}Classes", vertical))
            .and_then(Value::as_array)
            .and_then(|classes| classes.first())
            .and_then(Value::as_object)
            .unwrap_or_else(|| empty_map());
        Some(WalletPair {
            class,
            object,
            vertical: Some(vertical),
        })
    })
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Walk nested objects by key
fn at<'a>(root: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(root.get(*first)?, |value, key| value.as_object()?.get(*key))
}

/// Plain strings, numbers, or `LocalizedString` objects as text
fn text(value: &Value) -> Option<String> {
    let out = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => map
            .get("defaultValue")
            .and_then(|default| default.get("value"))
            .and_then(Value::as_str)?
            .to_string(),
        _ => return None,
    };
    (!out.trim().is_empty()).then_some(out)
}

fn text_at(root: &Map<String, Value>, path: &[&str]) -> Option<String> {
    at(root, path).and_then(text)
}

/// Google barcode types; unknown types read as QR
pub fn barcode_format(raw: &str) -> BarcodeFormat {
    match raw {
        "QR_CODE" => BarcodeFormat::Qr,
        "PDF_417" => BarcodeFormat::Pdf417,
        "AZTEC" => BarcodeFormat::Aztec,
        "CODE_128" => BarcodeFormat::Code128,
        "EAN_13" => BarcodeFormat::Ean13,
        "UPC_A" => BarcodeFormat::UpcA,
        "DATA_MATRIX" => BarcodeFormat::DataMatrix,
        _ => BarcodeFormat::Qr,
    }
}

impl WalletPair<'_> {
    fn pass_type(&self) -> PassType {
        let vertical = self.vertical.unwrap_or_default();
        let has = |key: &str| self.class.contains_key(key);

        if vertical == "flight" || has("flightHeader") {
            PassType::BoardingPass
        } else if vertical == "eventTicket" || has("eventName") {
            PassType::EventTicket
        } else if vertical == "loyalty" || has("programName") {
            PassType::StoreCard
        } else if vertical == "offer" || has("redemptionChannel") {
            PassType::Coupon
        } else {
            PassType::Generic
        }
    }

    fn flight_number(&self) -> Option<String> {
        let carrier = text_at(self.class, &["flightHeader", "carrier", "carrierIataCode"]);
        let number = text_at(self.class, &["flightHeader", "flightNumber"]);
        match (carrier, number) {
            (Some(carrier), Some(number)) => Some(format!("{}{}", carrier, number)),
            (None, number) => number,
            (carrier, None) => carrier,
        }
    }

    fn type_data(&self, pass_type: PassType) -> TypeSpecificData {
        let class = self.class;
        let object = self.object;

        match pass_type {
            PassType::BoardingPass => TypeSpecificData::BoardingPass {
                transit_type: Some("air".to_string()),
                origin: text_at(class, &["origin", "airportIataCode"]),
                destination: text_at(class, &["destination", "airportIataCode"]),
                gate: text_at(class, &["origin", "gate"])
                    .or_else(|| text_at(object, &["boardingAndSeatingInfo", "boardingDoor"])),
                seat: text_at(object, &["boardingAndSeatingInfo", "seatNumber"]),
                flight_number: self.flight_number(),
                passenger_name: text_at(object, &["passengerName"]),
                boarding_group: text_at(object, &["boardingAndSeatingInfo", "boardingGroup"]),
                departure_time: text_at(class, &["localScheduledDepartureDateTime"]),
            },
            PassType::EventTicket => TypeSpecificData::EventTicket {
                event_name: text_at(class, &["eventName"]),
                venue: text_at(class, &["venue", "name"]),
                event_date: text_at(class, &["dateTime", "start"]),
                seat: text_at(object, &["seatInfo", "seat"]),
                section: text_at(object, &["seatInfo", "section"]),
                row: text_at(object, &["seatInfo", "row"]),
                holder_name: text_at(object, &["ticketHolderName"]),
            },
            PassType::StoreCard => TypeSpecificData::StoreCard {
                balance: money_text(object),
                points: ["int", "string", "double"]
                    .into_iter()
                    .find_map(|kind| text_at(object, &["loyaltyPoints", "balance", kind])),
                tier: text_at(class, &["rewardsTier"]),
                member_name: text_at(object, &["accountName"]),
                member_id: text_at(object, &["accountId"]),
            },
            PassType::Coupon => TypeSpecificData::Coupon {
                offer: text_at(class, &["title"]),
                expires: text_at(object, &["validTimeInterval", "end", "date"]),
                code: text_at(object, &["barcode", "alternateText"]),
            },
            PassType::Generic => TypeSpecificData::Generic,
        }
    }

    fn title(&self, pass_type: PassType, type_data: &TypeSpecificData) -> Option<String> {
        let specific = match (pass_type, type_data) {
            (
                PassType::BoardingPass,
                TypeSpecificData::BoardingPass {
                    flight_number,
                    origin,
                    destination,
                    ..
                },
            ) => match (flight_number, origin, destination) {
                (Some(flight), Some(from), Some(to)) => Some(format!("{} {}-{}", flight, from, to)),
                (Some(flight), _, _) => Some(format!("Flight {}", flight)),
                _ => None,
            },
            (PassType::EventTicket, _) => text_at(self.class, &["eventName"]),
            (PassType::StoreCard, _) => text_at(self.class, &["programName"]),
            (PassType::Coupon, _) => text_at(self.class, &["title"]),
            _ => text_at(self.object, &["cardTitle"])
                .or_else(|| text_at(self.object, &["header"])),
        };
        specific.or_else(|| self.organization())
    }

    fn organization(&self) -> Option<String> {
        text_at(self.class, &["issuerName"])
            .or_else(|| text_at(self.class, &["localizedIssuerName"]))
            .or_else(|| text_at(self.class, &["flightHeader", "carrier", "airlineName"]))
            .or_else(|| text_at(self.object, &["issuerName"]))
    }

    fn barcode(&self) -> Barcode {
        let Some(raw) = self.object.get("barcode").and_then(Value::as_object) else {
            return Barcode::default();
        };
        Barcode {
            message: text_at(raw, &["value"]).unwrap_or_default(),
            format: raw
                .get("type")
                .and_then(Value::as_str)
                .map(barcode_format)
                .unwrap_or(BarcodeFormat::None),
            alt_text: text_at(raw, &["alternateText"]),
        }
    }

    /// Text modules of both halves; object modules first
    fn fields(&self) -> Vec<PassField> {
        [
            (FieldSection::Secondary, self.object),
            (FieldSection::Back, self.class),
        ]
        .into_iter()
        .flat_map(|(section, source)| {
            source
                .get("textModulesData")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_object)
                .filter_map(move |module| {
                    let value = text_at(module, &["body"])?;
                    let label = text_at(module, &["header"]);
                    let key = text_at(module, &["id"])
                        .or_else(|| label.clone())
                        .unwrap_or_default();
                    Some(PassField {
                        section,
                        key,
                        label,
                        value,
                    })
                })
        })
        .collect()
    }

    fn voided(&self) -> bool {
        matches!(
            self.object.get("state").and_then(Value::as_str),
            Some(state) if state.eq_ignore_ascii_case("EXPIRED") || state.eq_ignore_ascii_case("INACTIVE")
        )
    }

    fn relevant_date(&self) -> Option<String> {
        text_at(self.object, &["validTimeInterval", "start", "date"])
            .or_else(|| text_at(self.class, &["dateTime", "start"]))
            .or_else(|| text_at(self.class, &["localScheduledDepartureDateTime"]))
    }

    fn into_pass(self) -> UnifiedPass {
        let pass_type = self.pass_type();
        let type_data = self.type_data(pass_type);
        let title = self.title(pass_type, &type_data).unwrap_or_default();
        let serial_number = text_at(self.object, &["id"]);
        let background = text_at(self.object, &["hexBackgroundColor"])
            .or_else(|| text_at(self.class, &["hexBackgroundColor"]));

        UnifiedPass {
            id: serial_number.clone().unwrap_or_else(generate_pass_id),
            pass_type,
            title,
            organization_name: self.organization().unwrap_or_default(),
            description: text_at(self.object, &["header"])
                .or_else(|| text_at(self.class, &["localizedDescription"])),
            colors: PassColors {
                foreground: None,
                background: background.as_deref().and_then(normalize_color),
                label: None,
            },
            logo_text: text_at(self.class, &["localizedIssuerName"]),
            serial_number,
            relevant_date: self.relevant_date().as_deref().and_then(parse_timestamp),
            expiration_date: text_at(self.object, &["validTimeInterval", "end", "date"])
                .as_deref()
                .and_then(parse_timestamp),
            voided: self.voided(),
            fields: self.fields(),
            barcode: self.barcode(),
            type_data,
            images: PassImages::default(),
            source_path: None,
            imported: false,
            format_name: None,
        }
    }
}

fn money_text(object: &Map<String, Value>) -> Option<String> {
    let micros = at(object, &["loyaltyPoints", "balance", "money", "micros"])?;
    let micros = micros
        .as_i64()
        .or_else(|| micros.as_str().and_then(|s| s.parse().ok()))?;
    let currency = text_at(object, &["loyaltyPoints", "balance", "money", "currencyCode"])?;
    Some(format!("{:.2} {}", micros as f64 / 1_000_000.0, currency))
}

impl PassFormatHandler for GoogleWalletHandler {
    fn format_name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::GoogleWallet
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["json", "gwallet"]
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        &["application/json", "application/vnd.google.wallet+json"]
    }

    fn can_handle(
        &self,
        file_name: Option<&str>,
        mime_type: Option<&str>,
        stream: &mut dyn Read,
    ) -> bool {
        let mut prefix = Vec::new();
        if let Err(err) = (&mut *stream).take(self.probe_limit).read_to_end(&mut prefix) {
            debug!(error = %err, "failed to read detection prefix");
            return false;
        }

        match serde_json::from_slice::<Value>(strip_bom(&prefix)) {
            Ok(doc) => extract_pair(&doc).is_some(),
            // A cut-off document cannot be probed; trust the hints instead
            Err(_) if prefix.len() as u64 >= self.probe_limit => {
                self.matches_extension(file_name) || self.matches_mime_type(mime_type)
            }
            Err(_) => false,
        }
    }

    fn parse_pass(
        &self,
        stream: &mut dyn Read,
        file_name: Option<&str>,
        _metadata: &ImportMetadata,
    ) -> Result<Option<UnifiedPass>, HandlerError> {
        let mut raw = Vec::new();
        (&mut *stream)
            .take(self.max_document_bytes + 1)
            .read_to_end(&mut raw)?;
        if raw.len() as u64 > self.max_document_bytes {
            return Err(HandlerError::parsing(
                FORMAT_NAME,
                file_name,
                format!("document exceeds {} bytes", self.max_document_bytes),
            ));
        }

        let doc: Value = serde_json::from_slice(strip_bom(&raw))
            .map_err(|err| HandlerError::parsing(FORMAT_NAME, file_name, err))?;

        let Some(pair) = extract_pair(&doc) else {
            debug!(file = ?file_name, "document has no class/object pair");
            return Ok(None);
        };

        Ok(Some(pair.into_pass()))
    }

    fn validate_pass(&self, pass: &UnifiedPass) -> ValidationResult {
        validate_common(pass)
    }
}
