use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Pass category, shared by every source format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassType {
    BoardingPass,
    Coupon,
    EventTicket,
    StoreCard,
    Generic,
}

impl PassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassType::BoardingPass => "boarding_pass",
            PassType::Coupon => "coupon",
            PassType::EventTicket => "event_ticket",
            PassType::StoreCard => "store_card",
            PassType::Generic => "generic",
        }
    }
}

impl fmt::Display for PassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarcodeFormat {
    Qr,
    Pdf417,
    Aztec,
    Code128,
    Ean13,
    UpcA,
    DataMatrix,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Barcode {
    pub message: String,
    pub format: BarcodeFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

impl Barcode {
    /// True when there is something a scanner could read
    pub fn is_present(&self) -> bool {
        self.format != BarcodeFormat::None && !self.message.trim().is_empty()
    }
}

/// Colour theme as `#RRGGBB` strings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PassColors {
    pub foreground: Option<String>,
    pub background: Option<String>,
    pub label: Option<String>,
}

/// Which section of the pass face a field was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSection {
    Header,
    Primary,
    Secondary,
    Auxiliary,
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassField {
    pub section: FieldSection,
    pub key: String,
    pub label: Option<String>,
    pub value: String,
}

/// Category-specific payload. Every attribute is best-effort: a source that
/// does not carry it leaves it `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeSpecificData {
    BoardingPass {
        transit_type: Option<String>,
        origin: Option<String>,
        destination: Option<String>,
        gate: Option<String>,
        seat: Option<String>,
        flight_number: Option<String>,
        passenger_name: Option<String>,
        boarding_group: Option<String>,
        departure_time: Option<String>,
    },
    Coupon {
        offer: Option<String>,
        expires: Option<String>,
        code: Option<String>,
    },
    EventTicket {
        event_name: Option<String>,
        venue: Option<String>,
        event_date: Option<String>,
        seat: Option<String>,
        section: Option<String>,
        row: Option<String>,
        holder_name: Option<String>,
    },
    StoreCard {
        balance: Option<String>,
        points: Option<String>,
        tier: Option<String>,
        member_name: Option<String>,
        member_id: Option<String>,
    },
    #[default]
    Generic,
}

impl TypeSpecificData {
    pub fn pass_type(&self) -> PassType {
        match self {
            TypeSpecificData::BoardingPass { .. } => PassType::BoardingPass,
            TypeSpecificData::Coupon { .. } => PassType::Coupon,
            TypeSpecificData::EventTicket { .. } => PassType::EventTicket,
            TypeSpecificData::StoreCard { .. } => PassType::StoreCard,
            TypeSpecificData::Generic => PassType::Generic,
        }
    }
}

/// Artwork slots a pass can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    Background,
    Icon,
    Logo,
    Strip,
    Thumbnail,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 5] = [
        ImageSlot::Background,
        ImageSlot::Icon,
        ImageSlot::Logo,
        ImageSlot::Strip,
        ImageSlot::Thumbnail,
    ];

    /// Base entry name used by PKPass archives (`icon` -> `icon.png`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSlot::Background => "background",
            ImageSlot::Icon => "icon",
            ImageSlot::Logo => "logo",
            ImageSlot::Strip => "strip",
            ImageSlot::Thumbnail => "thumbnail",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.as_str() == value)
    }
}

/// Raw image bytes. Not serialized with the pass; the store keeps them apart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PassImages {
    pub background: Option<Bytes>,
    pub icon: Option<Bytes>,
    pub logo: Option<Bytes>,
    pub strip: Option<Bytes>,
    pub thumbnail: Option<Bytes>,
}

impl PassImages {
    pub fn get(&self, slot: ImageSlot) -> Option<&Bytes> {
        match slot {
            ImageSlot::Background => self.background.as_ref(),
            ImageSlot::Icon => self.icon.as_ref(),
            ImageSlot::Logo => self.logo.as_ref(),
            ImageSlot::Strip => self.strip.as_ref(),
            ImageSlot::Thumbnail => self.thumbnail.as_ref(),
        }
    }

    pub fn set(&mut self, slot: ImageSlot, data: Option<Bytes>) {
        let target = match slot {
            ImageSlot::Background => &mut self.background,
            ImageSlot::Icon => &mut self.icon,
            ImageSlot::Logo => &mut self.logo,
            ImageSlot::Strip => &mut self.strip,
            ImageSlot::Thumbnail => &mut self.thumbnail,
        };
        *target = data;
    }

    pub fn iter(&self) -> impl Iterator<Item = (ImageSlot, &Bytes)> {
        ImageSlot::ALL
            .into_iter()
            .filter_map(|slot| self.get(slot).map(|data| (slot, data)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Normalized pass produced by every format handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedPass {
    pub id: String,
    pub pass_type: PassType,
    pub title: String,
    pub organization_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub colors: PassColors,
    pub logo_text: Option<String>,
    pub serial_number: Option<String>,
    pub relevant_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voided: bool,
    #[serde(default)]
    pub type_data: TypeSpecificData,
    #[serde(default)]
    pub fields: Vec<PassField>,
    #[serde(default)]
    pub barcode: Barcode,
    #[serde(skip)]
    pub images: PassImages,
    pub source_path: Option<String>,
    #[serde(default)]
    pub imported: bool,
    pub format_name: Option<String>,
}

impl UnifiedPass {
    /// Empty generic pass with a freshly generated id
    pub fn new(title: impl Into<String>, organization_name: impl Into<String>) -> Self {
        Self {
            id: generate_pass_id(),
            pass_type: PassType::Generic,
            title: title.into(),
            organization_name: organization_name.into(),
            description: None,
            colors: PassColors::default(),
            logo_text: None,
            serial_number: None,
            relevant_date: None,
            expiration_date: None,
            voided: false,
            type_data: TypeSpecificData::Generic,
            fields: Vec::new(),
            barcode: Barcode::default(),
            images: PassImages::default(),
            source_path: None,
            imported: false,
            format_name: None,
        }
    }
}

pub fn generate_pass_id() -> String {
    Uuid::new_v4().to_string()
}

/// Normalize a colour to `#RRGGBB`. Accepts `rgb(r, g, b)` and hex forms.
pub fn normalize_color(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if let Some(hex) = raw.strip_prefix('#') {
        let valid = matches!(hex.len(), 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
        return valid.then(|| format!("#{}", hex.to_ascii_uppercase()));
    }

    let inner = raw
        .strip_prefix("rgb(")
        .or_else(|| raw.strip_prefix("rgba("))?
        .strip_suffix(')')?;

    let channels: Vec<u8> = inner
        .split(',')
        .take(3)
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;

    match channels.as_slice() {
        [r, g, b] => Some(format!("#{:02X}{:02X}{:02X}", r, g, b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rgb_color() {
        assert_eq!(normalize_color("rgb(255, 0, 16)").as_deref(), Some("#FF0010"));
        assert_eq!(normalize_color("rgb(1,2,3)").as_deref(), Some("#010203"));
    }

    #[test]
    fn test_normalize_hex_color() {
        assert_eq!(normalize_color("#a1b2c3").as_deref(), Some("#A1B2C3"));
        assert_eq!(normalize_color("#zzzzzz"), None);
        assert_eq!(normalize_color("blue"), None);
        assert_eq!(normalize_color("rgb(300, 0, 0)"), None);
    }

    #[test]
    fn test_image_slots() {
        let mut images = PassImages::default();
        assert!(images.is_empty());

        images.set(ImageSlot::Strip, Some(Bytes::from_static(b"strip")));
        assert_eq!(images.get(ImageSlot::Strip).unwrap().as_ref(), b"strip");
        assert_eq!(images.iter().count(), 1);
        assert_eq!(ImageSlot::parse("thumbnail"), Some(ImageSlot::Thumbnail));
        assert_eq!(ImageSlot::parse("cover"), None);
    }

    #[test]
    fn test_barcode_presence() {
        assert!(!Barcode::default().is_present());

        let barcode = Barcode {
            message: "123".to_string(),
            format: BarcodeFormat::Aztec,
            alt_text: None,
        };
        assert!(barcode.is_present());
    }

    #[test]
    fn test_type_data_serialization_is_tagged() {
        let data = TypeSpecificData::StoreCard {
            balance: None,
            points: Some("120".to_string()),
            tier: Some("Gold".to_string()),
            member_name: None,
            member_id: None,
        };

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "store_card");
        assert_eq!(json["tier"], "Gold");
        assert_eq!(data.pass_type(), PassType::StoreCard);
    }

    #[test]
    fn test_new_pass_generates_unique_ids() {
        let a = UnifiedPass::new("a", "org");
        let b = UnifiedPass::new("b", "org");
        assert_ne!(a.id, b.id);
        assert!(!a.voided);
        assert!(!a.imported);
    }
}
