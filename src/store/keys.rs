//! Key layout for the pass store
//!
//! Partition structure:
//! - `passes`: pass:{id} -> UnifiedPass (JSON, images stripped)
//! - `images`: img:{id}:{slot} -> raw image bytes

use crate::model::ImageSlot;

/// Encode a pass key: pass:{id}
pub fn encode_pass_key(id: &str) -> Vec<u8> {
    format!("pass:{}", id).into_bytes()
}

/// Decode a pass key: pass:{id} -> id
pub fn decode_pass_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("pass:").map(String::from)
}

/// Encode an image key: img:{id}:{slot}
pub fn encode_image_key(id: &str, slot: ImageSlot) -> Vec<u8> {
    format!("img:{}:{}", id, slot.as_str()).into_bytes()
}
