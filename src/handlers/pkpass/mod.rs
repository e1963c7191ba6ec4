//! Apple Wallet `.pkpass` archives: a zip holding `pass.json` plus PNG artwork

mod schema;

use bytes::Bytes;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::debug;

use super::dates::parse_timestamp;
use super::traits::{HandlerError, HandlerKind, PassFormatHandler};
use super::types::ImportMetadata;
use crate::config::IngestConfig;
use crate::model::{
    Barcode, BarcodeFormat, ImageSlot, PassColors, PassImages, PassType, TypeSpecificData,
    UnifiedPass, ValidationResult, generate_pass_id, normalize_color, validate_common,
};
use schema::{BarcodeJson, PassJson, PassStructure};

pub const PASS_JSON: &str = "pass.json";
const FORMAT_NAME: &str = "PKPass";

const LOCAL_HEADER_SIGNATURE: &[u8] = b"PK\x03\x04";
const LOCAL_HEADER_LEN: usize = 30;

/// Handler for Apple's zip-based pass container
#[derive(Debug, Clone)]
pub struct PkPassHandler {
    /// Entries inspected when sniffing an un-named stream
    entry_limit: usize,
    /// Bytes scanned for headers the streaming reader cannot skip over
    scan_bytes: u64,
    /// Cap on both the raw archive and its decompressed entries
    max_archive_bytes: u64,
}

impl PkPassHandler {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            entry_limit: config.pkpass_probe_entries,
            scan_bytes: config.mark_limit.as_u64(),
            max_archive_bytes: config.max_archive_bytes.as_u64(),
        }
    }

    /// Walk local headers looking for `pass.json`.
    ///
    /// Entries whose sizes live in a trailing data descriptor cannot be
    /// streamed past; from such an entry on, local headers are located by
    /// signature within `scan_bytes`.
    fn sniff_archive(&self, stream: &mut dyn Read) -> bool {
        let mut recorder = HeaderRecorder {
            inner: stream,
            seen: Vec::new(),
        };

        for index in 0..self.entry_limit {
            recorder.seen.clear();
            let err = match zip::read::read_zipfile_from_stream(&mut recorder) {
                Ok(Some(entry)) if entry.name() == PASS_JSON => return true,
                Ok(Some(_)) => continue,
                Ok(None) => return false,
                Err(err) => err,
            };

            let mut window = std::mem::take(&mut recorder.seen);
            if !window.starts_with(LOCAL_HEADER_SIGNATURE) {
                debug!(error = %err, "stream is not a readable zip archive");
                return false;
            }

            debug!(error = %err, "entry cannot be streamed, scanning local headers");
            let budget = self.scan_bytes.saturating_sub(window.len() as u64);
            if let Err(err) = (&mut *recorder.inner).take(budget).read_to_end(&mut window) {
                debug!(error = %err, "failed to read header window");
                return false;
            }
            return scan_local_headers(&window, self.entry_limit - index);
        }
        false
    }

    /// Read every entry once, keeping `pass.json` and PNG artwork
    fn read_archive(
        &self,
        stream: &mut dyn Read,
        file_name: Option<&str>,
    ) -> Result<ArchiveContents, HandlerError> {
        let mut raw = Vec::new();
        (&mut *stream)
            .take(self.max_archive_bytes + 1)
            .read_to_end(&mut raw)?;

        if raw.len() as u64 > self.max_archive_bytes {
            return Err(HandlerError::parsing(
                FORMAT_NAME,
                file_name,
                format!("archive exceeds {} bytes", self.max_archive_bytes),
            ));
        }

        let mut archive = zip::ZipArchive::new(Cursor::new(raw))
            .map_err(|err| HandlerError::parsing(FORMAT_NAME, file_name, err))?;

        let mut contents = ArchiveContents::default();
        let mut inflated: u64 = 0;
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|err| HandlerError::parsing(FORMAT_NAME, file_name, err))?;
            if entry.is_dir() {
                continue;
            }

            let name = entry.name().to_string();
            let is_pass_json = name == PASS_JSON;
            if !is_pass_json && !name.to_ascii_lowercase().ends_with(".png") {
                continue;
            }

            // Declared entry sizes are untrusted; only what actually inflates counts
            let remaining = self.max_archive_bytes.saturating_sub(inflated);
            let mut data = Vec::new();
            (&mut entry)
                .take(remaining + 1)
                .read_to_end(&mut data)
                .map_err(|err| HandlerError::parsing(FORMAT_NAME, file_name, err))?;
            inflated += data.len() as u64;
            if inflated > self.max_archive_bytes {
                return Err(HandlerError::parsing(
                    FORMAT_NAME,
                    file_name,
                    format!(
                        "archive contents exceed {} bytes when decompressed",
                        self.max_archive_bytes
                    ),
                ));
            }

            if is_pass_json {
                let text = String::from_utf8(data)
                    .map_err(|err| HandlerError::parsing(FORMAT_NAME, file_name, err))?;
                contents.pass_json = Some(text);
            } else {
                contents.files.insert(name, Bytes::from(data));
            }
        }

        Ok(contents)
    }
}

/// Keeps the bytes of the entry currently being streamed
struct HeaderRecorder<'a> {
    inner: &'a mut dyn Read,
    seen: Vec<u8>,
}

impl Read for HeaderRecorder<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.seen.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

/// Find `pass.json` among up to `max_entries` local headers in `window`
fn scan_local_headers(window: &[u8], max_entries: usize) -> bool {
    let mut offset = 0;
    for _ in 0..max_entries {
        let Some(found) = window[offset..]
            .windows(LOCAL_HEADER_SIGNATURE.len())
            .position(|candidate| candidate == LOCAL_HEADER_SIGNATURE)
        else {
            return false;
        };
        let header = offset + found;

        let Some(name) = local_header_name(&window[header..]) else {
            return false;
        };
        if name == PASS_JSON.as_bytes() {
            return true;
        }
        offset = header + LOCAL_HEADER_LEN + name.len();
    }
    false
}

/// File name field of a local file header, if the whole name is present
fn local_header_name(header: &[u8]) -> Option<&[u8]> {
    let length = header.get(26..28)?;
    let length = u16::from_le_bytes([length[0], length[1]]) as usize;
    header.get(LOCAL_HEADER_LEN..LOCAL_HEADER_LEN + length)
}

#[derive(Debug, Default)]
struct ArchiveContents {
    pass_json: Option<String>,
    files: HashMap<String, Bytes>,
}

impl ArchiveContents {
    /// `name.png`, falling back to the retina variants
    fn image(&self, slot: ImageSlot) -> Option<Bytes> {
        ["", "@2x", "@3x"]
            .iter()
            .find_map(|scale| self.files.get(&format!("{}{}.png", slot.as_str(), scale)))
            .cloned()
    }

    fn images(&self) -> PassImages {
        let mut images = PassImages::default();
        for slot in ImageSlot::ALL {
            images.set(slot, self.image(slot));
        }
        images
    }
}

impl PassFormatHandler for PkPassHandler {
    fn format_name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::PkPass
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["pkpass"]
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        &["application/vnd.apple.pkpass"]
    }

    fn can_handle(
        &self,
        file_name: Option<&str>,
        mime_type: Option<&str>,
        stream: &mut dyn Read,
    ) -> bool {
        if self.matches_extension(file_name) || self.matches_mime_type(mime_type) {
            return true;
        }
        self.sniff_archive(stream)
    }

    fn parse_pass(
        &self,
        stream: &mut dyn Read,
        file_name: Option<&str>,
        _metadata: &ImportMetadata,
    ) -> Result<Option<UnifiedPass>, HandlerError> {
        let contents = self.read_archive(stream, file_name)?;

        let Some(text) = contents.pass_json.as_deref() else {
            debug!(file = ?file_name, "archive has no pass.json");
            return Ok(None);
        };

        let pass_json: PassJson = serde_json::from_str(text)
            .map_err(|err| HandlerError::parsing(FORMAT_NAME, file_name, err))?;

        Ok(Some(build_pass(pass_json, contents.images())))
    }

    fn validate_pass(&self, pass: &UnifiedPass) -> ValidationResult {
        validate_common(pass)
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

fn build_pass(json: PassJson, images: PassImages) -> UnifiedPass {
    let (pass_type, structure) = select_style(&json);
    let type_data = structure
        .map(|s| type_data_for(pass_type, s))
        .unwrap_or_default();
    let fields = structure.map(PassStructure::flatten).unwrap_or_default();

    let title = non_blank(json.logo_text.as_ref())
        .or_else(|| non_blank(json.description.as_ref()))
        .or_else(|| non_blank(json.organization_name.as_ref()))
        .unwrap_or_default();

    let serial_number = non_blank(json.serial_number.as_ref());

    UnifiedPass {
        id: serial_number.clone().unwrap_or_else(generate_pass_id),
        pass_type,
        title,
        organization_name: json.organization_name.clone().unwrap_or_default(),
        description: non_blank(json.description.as_ref()),
        colors: PassColors {
            foreground: json.foreground_color.as_deref().and_then(normalize_color),
            background: json.background_color.as_deref().and_then(normalize_color),
            label: json.label_color.as_deref().and_then(normalize_color),
        },
        logo_text: non_blank(json.logo_text.as_ref()),
        serial_number,
        relevant_date: json.relevant_date.as_deref().and_then(parse_timestamp),
        expiration_date: json.expiration_date.as_deref().and_then(parse_timestamp),
        voided: json.voided.unwrap_or(false),
        type_data,
        fields,
        barcode: json
            .barcodes
            .first()
            .or(json.barcode.as_ref())
            .map(convert_barcode)
            .unwrap_or_default(),
        images,
        source_path: None,
        imported: false,
        format_name: None,
    }
}

/// First populated style in fixed priority order; generic when none is
fn select_style(json: &PassJson) -> (PassType, Option<&PassStructure>) {
    [
        (PassType::BoardingPass, json.boarding_pass.as_ref()),
        (PassType::Coupon, json.coupon.as_ref()),
        (PassType::EventTicket, json.event_ticket.as_ref()),
        (PassType::StoreCard, json.store_card.as_ref()),
        (PassType::Generic, json.generic.as_ref()),
    ]
    .into_iter()
    .find_map(|(pass_type, structure)| structure.map(|s| (pass_type, Some(s))))
    .unwrap_or((PassType::Generic, None))
}

fn type_data_for(pass_type: PassType, s: &PassStructure) -> TypeSpecificData {
    match pass_type {
        PassType::BoardingPass => TypeSpecificData::BoardingPass {
            transit_type: s.transit_type.as_deref().map(transit_type_name),
            origin: s.lookup(&["origin", "from", "depart"]),
            destination: s.lookup(&["destination", "to", "arrive"]),
            gate: s.lookup(&["gate"]),
            seat: s.lookup(&["seat"]),
            flight_number: s.lookup(&["flight", "flightNumber"]),
            passenger_name: s.lookup(&["passenger", "name"]),
            boarding_group: s.lookup(&["boardingGroup", "group", "zone"]),
            departure_time: s.lookup(&["departure", "departureTime", "boardingTime"]),
        },
        PassType::Coupon => TypeSpecificData::Coupon {
            offer: s.lookup(&["offer"]),
            expires: s.lookup(&["expires", "expiry"]),
            code: s.lookup(&["code", "couponCode"]),
        },
        PassType::EventTicket => TypeSpecificData::EventTicket {
            event_name: s.lookup(&["event", "eventName"]),
            venue: s.lookup(&["venue", "location"]),
            event_date: s.lookup(&["date", "eventDate"]),
            seat: s.lookup(&["seat"]),
            section: s.lookup(&["section"]),
            row: s.lookup(&["row"]),
            holder_name: s.lookup(&["name", "holder"]),
        },
        PassType::StoreCard => TypeSpecificData::StoreCard {
            balance: s.lookup(&["balance"]),
            points: s.lookup(&["points"]),
            tier: s.lookup(&["tier", "level"]),
            member_name: s.lookup(&["member", "memberName"]),
            member_id: s.lookup(&["memberId", "number"]),
        },
        PassType::Generic => TypeSpecificData::Generic,
    }
}

fn transit_type_name(raw: &str) -> String {
    raw.strip_prefix("PKTransitType")
        .unwrap_or(raw)
        .to_ascii_lowercase()
}

fn convert_barcode(barcode: &BarcodeJson) -> Barcode {
    Barcode {
        message: barcode.message.clone().unwrap_or_default(),
        format: barcode_format(barcode.format.as_deref()),
        alt_text: non_blank(barcode.alt_text.as_ref()),
    }
}

/// Apple format identifiers; unknown or missing formats read as QR
pub fn barcode_format(raw: Option<&str>) -> BarcodeFormat {
    match raw {
        Some("PKBarcodeFormatPDF417") => BarcodeFormat::Pdf417,
        Some("PKBarcodeFormatAztec") => BarcodeFormat::Aztec,
        Some("PKBarcodeFormatCode128") => BarcodeFormat::Code128,
        _ => BarcodeFormat::Qr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    fn handler() -> PkPassHandler {
        PkPassHandler::new(&IngestConfig::default())
    }

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Rewrite the first local header the way streaming writers emit it:
    /// flag bit 3 set, CRC and sizes deferred to a data descriptor
    fn with_data_descriptor(mut bytes: Vec<u8>) -> Vec<u8> {
        bytes[6] |= 0x08;
        bytes[14..26].fill(0);
        bytes
    }

    fn parse(bytes: Vec<u8>) -> Result<Option<UnifiedPass>, HandlerError> {
        handler().parse_pass(&mut Cursor::new(bytes), Some("test.pkpass"), &ImportMetadata::new())
    }

    const BOARDING_JSON: &str = r#"{
        "formatVersion": 1,
        "serialNumber": "SN-42",
        "organizationName": "Acme Air",
        "description": "Boarding pass",
        "foregroundColor": "rgb(255, 255, 255)",
        "backgroundColor": "rgb(0, 51, 102)",
        "relevantDate": "2025-01-15T10:00:00+0000",
        "expirationDate": "not a date",
        "barcodes": [{ "format": "PKBarcodeFormatAztec", "message": "M1DOE", "messageEncoding": "iso-8859-1" }],
        "boardingPass": {
            "transitType": "PKTransitTypeAir",
            "headerFields": [{ "key": "gate", "label": "Gate", "value": "B7" }],
            "primaryFields": [
                { "key": "origin", "value": "SFO" },
                { "key": "destination", "value": "JFK" }
            ],
            "auxiliaryFields": [{ "key": "seat", "value": "12A" }]
        },
        "coupon": { "primaryFields": [{ "key": "offer", "value": "ignored" }] }
    }"#;

    #[test]
    fn test_can_handle_by_extension_and_mime() {
        let h = handler();
        let mut empty = Cursor::new(Vec::new());
        assert!(h.can_handle(Some("Ticket.PKPass"), None, &mut empty));
        assert!(h.can_handle(None, Some("application/vnd.apple.pkpass"), &mut empty));
        assert!(!h.can_handle(Some("ticket.json"), None, &mut empty));
    }

    #[test]
    fn test_can_handle_by_scanning_entries() {
        let bytes = archive(&[("icon.png", b"png"), (PASS_JSON, b"{}")]);
        assert!(handler().can_handle(None, None, &mut Cursor::new(bytes)));

        let no_pass = archive(&[("readme.txt", b"hello")]);
        assert!(!handler().can_handle(None, None, &mut Cursor::new(no_pass)));
    }

    #[test]
    fn test_can_handle_rejects_garbage() {
        let mut garbage = Cursor::new(b"definitely not a zip archive".to_vec());
        assert!(!handler().can_handle(Some("upload.bin"), None, &mut garbage));
    }

    #[test]
    fn test_detection_gives_up_after_entry_cap() {
        let config = IngestConfig {
            pkpass_probe_entries: 2,
            ..IngestConfig::default()
        };
        let bytes = archive(&[("a.txt", b"a"), ("b.txt", b"b"), (PASS_JSON, b"{}")]);
        let h = PkPassHandler::new(&config);
        assert!(!h.can_handle(None, None, &mut Cursor::new(bytes)));
    }

    #[test]
    fn test_can_handle_data_descriptor_entries() {
        let first = with_data_descriptor(archive(&[(PASS_JSON, BOARDING_JSON.as_bytes())]));
        assert!(handler().can_handle(None, None, &mut Cursor::new(first)));

        let later = with_data_descriptor(archive(&[
            ("icon.png", b"png"),
            (PASS_JSON, BOARDING_JSON.as_bytes()),
        ]));
        assert!(handler().can_handle(None, None, &mut Cursor::new(later)));

        let no_pass = with_data_descriptor(archive(&[("icon.png", b"png")]));
        assert!(!handler().can_handle(None, None, &mut Cursor::new(no_pass)));
    }

    #[test]
    fn test_data_descriptor_archive_parses() {
        let bytes = with_data_descriptor(archive(&[(PASS_JSON, BOARDING_JSON.as_bytes())]));
        let pass = parse(bytes).unwrap().unwrap();
        assert_eq!(pass.id, "SN-42");
    }

    #[test]
    fn test_scan_local_headers() {
        let mut window = b"PK\x03\x04".to_vec();
        window.extend_from_slice(&[0; 22]);
        window.extend_from_slice(&9u16.to_le_bytes());
        window.extend_from_slice(&0u16.to_le_bytes());
        window.extend_from_slice(PASS_JSON.as_bytes());

        assert!(scan_local_headers(&window, 1));
        assert!(!scan_local_headers(&window[..35], 1));
        assert!(!scan_local_headers(b"no headers here", 10));
    }

    #[test]
    fn test_parse_boarding_pass() {
        let bytes = archive(&[(PASS_JSON, BOARDING_JSON.as_bytes())]);
        let pass = parse(bytes).unwrap().unwrap();

        assert_eq!(pass.id, "SN-42");
        assert_eq!(pass.pass_type, PassType::BoardingPass);
        assert_eq!(pass.title, "Boarding pass");
        assert_eq!(pass.organization_name, "Acme Air");
        assert_eq!(pass.colors.background.as_deref(), Some("#003366"));
        assert_eq!(pass.colors.foreground.as_deref(), Some("#FFFFFF"));
        assert!(pass.relevant_date.is_some());
        assert!(pass.expiration_date.is_none());
        assert_eq!(pass.barcode.format, BarcodeFormat::Aztec);
        assert_eq!(pass.barcode.message, "M1DOE");
        assert_eq!(pass.fields.len(), 4);

        match pass.type_data {
            TypeSpecificData::BoardingPass {
                transit_type,
                origin,
                gate,
                seat,
                flight_number,
                ..
            } => {
                assert_eq!(transit_type.as_deref(), Some("air"));
                assert_eq!(origin.as_deref(), Some("SFO"));
                assert_eq!(gate.as_deref(), Some("B7"));
                assert_eq!(seat.as_deref(), Some("12A"));
                assert!(flight_number.is_none());
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_missing_serial_generates_id() {
        let bytes = archive(&[(PASS_JSON, br#"{"organizationName":"Org","generic":{}}"#)]);
        let pass = parse(bytes).unwrap().unwrap();

        assert!(pass.serial_number.is_none());
        assert!(uuid::Uuid::parse_str(&pass.id).is_ok());
        assert_eq!(pass.title, "Org");
        assert_eq!(pass.barcode.format, BarcodeFormat::None);
    }

    #[test]
    fn test_no_style_defaults_to_generic() {
        let bytes = archive(&[(PASS_JSON, br#"{"organizationName":"Org"}"#)]);
        let pass = parse(bytes).unwrap().unwrap();
        assert_eq!(pass.pass_type, PassType::Generic);
        assert_eq!(pass.type_data, TypeSpecificData::Generic);
    }

    #[test]
    fn test_image_falls_back_to_retina() {
        let bytes = archive(&[
            (PASS_JSON, br#"{"organizationName":"Org"}"#),
            ("icon@2x.png", b"icon-2x"),
            ("logo.png", b"logo-1x"),
            ("logo@2x.png", b"logo-2x"),
            ("strip@3x.png", b"strip-3x"),
            ("notes.txt", b"ignored"),
        ]);
        let pass = parse(bytes).unwrap().unwrap();

        assert_eq!(pass.images.icon.as_deref(), Some(&b"icon-2x"[..]));
        assert_eq!(pass.images.logo.as_deref(), Some(&b"logo-1x"[..]));
        assert_eq!(pass.images.strip.as_deref(), Some(&b"strip-3x"[..]));
        assert!(pass.images.thumbnail.is_none());
    }

    #[test]
    fn test_legacy_single_barcode() {
        let json = br#"{"organizationName":"Org","barcode":{"format":"PKBarcodeFormatPDF417","message":"X"}}"#;
        let pass = parse(archive(&[(PASS_JSON, json)])).unwrap().unwrap();
        assert_eq!(pass.barcode.format, BarcodeFormat::Pdf417);
    }

    #[test]
    fn test_archive_without_pass_json_is_none() {
        let bytes = archive(&[("icon.png", b"png")]);
        assert!(parse(bytes).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_json_is_parsing_error() {
        let bytes = archive(&[(PASS_JSON, b"{ not json")]);
        let err = parse(bytes).unwrap_err();
        assert!(matches!(err, HandlerError::Parsing { format: "PKPass", .. }));
        assert!(err.to_string().contains("test.pkpass"));
    }

    #[test]
    fn test_not_a_zip_is_parsing_error() {
        let err = parse(b"garbage".to_vec()).unwrap_err();
        assert!(matches!(err, HandlerError::Parsing { .. }));
    }

    #[test]
    fn test_oversized_archive_rejected() {
        let config = IngestConfig {
            max_archive_bytes: crate::humanize::ByteSize(64),
            ..IngestConfig::default()
        };
        let bytes = archive(&[(PASS_JSON, &[b' '; 256])]);
        let err = PkPassHandler::new(&config)
            .parse_pass(&mut Cursor::new(bytes), None, &ImportMetadata::new())
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_decompressed_size_is_capped() {
        let config = IngestConfig {
            max_archive_bytes: crate::humanize::ByteSize(256 * 1024),
            ..IngestConfig::default()
        };
        let background = vec![0u8; 4 * 1024 * 1024];
        let bytes = archive(&[
            (PASS_JSON, BOARDING_JSON.as_bytes()),
            ("background.png", &background),
        ]);
        assert!(bytes.len() < 256 * 1024);

        let err = PkPassHandler::new(&config)
            .parse_pass(&mut Cursor::new(bytes), None, &ImportMetadata::new())
            .unwrap_err();
        assert!(matches!(err, HandlerError::Parsing { .. }));
        assert!(err.to_string().contains("decompressed"));
    }

    #[test]
    fn test_barcode_format_mapping() {
        assert_eq!(barcode_format(Some("PKBarcodeFormatQR")), BarcodeFormat::Qr);
        assert_eq!(barcode_format(Some("PKBarcodeFormatAztec")), BarcodeFormat::Aztec);
        assert_eq!(barcode_format(Some("PKBarcodeFormatCode128")), BarcodeFormat::Code128);
        assert_eq!(barcode_format(Some("PKBarcodeFormatFoo")), BarcodeFormat::Qr);
        assert_eq!(barcode_format(None), BarcodeFormat::Qr);
    }
}
