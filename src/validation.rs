use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use rust_decimal::Decimal;

use crate::error::AssemblyError;

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
pub const MAX_OPTION_CODE_LEN: usize = 32;
pub const MAX_REFERENCE_LEN: usize = 256;
pub const MAX_SIGNATURE_BYTES: usize = 256 * 1024;

const _: [(); 1_048_576 - MAX_SIGNATURE_BYTES] = [(); 1_048_576 - MAX_SIGNATURE_BYTES];

/// Trimmed, non-empty, bounded text.
pub fn required_text(value: &str, max_len: usize, label: &str) -> Result<String, AssemblyError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AssemblyError::validation(format!(
            "{label} must not be empty"
        )));
    }
    if trimmed.chars().count() > max_len {
        return Err(AssemblyError::validation(format!(
            "{label} exceeds {max_len} character limit"
        )));
    }
    Ok(trimmed.to_string())
}

/// Like [`required_text`] but blank input collapses to `None`.
pub fn optional_text(
    value: Option<String>,
    max_len: usize,
    label: &str,
) -> Result<Option<String>, AssemblyError> {
    match value {
        Some(raw) if !raw.trim().is_empty() => required_text(&raw, max_len, label).map(Some),
        _ => Ok(None),
    }
}

pub fn percentage(value: Decimal, label: &str) -> Result<Decimal, AssemblyError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(AssemblyError::validation(format!(
            "{label} must be between 0 and 100, got {value}"
        )));
    }
    Ok(value)
}

/// Accepts `#RGB` or `#RRGGBB`; returns the lowercase form.
pub fn color(value: Option<String>) -> Result<Option<String>, AssemblyError> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let expanded = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => digits.to_string(),
        _ => {
            return Err(AssemblyError::validation(format!(
                "color {trimmed} must be #RGB or #RRGGBB"
            )));
        }
    };
    hex::decode(&expanded).map_err(|err| {
        AssemblyError::validation(format!("color {trimmed} is not valid hex: {err}"))
    })?;
    Ok(Some(format!("#{}", expanded.to_ascii_lowercase())))
}

pub fn decode_signature(value: &str) -> Result<Vec<u8>, AssemblyError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AssemblyError::validation("signature cannot be empty"));
    }

    if let Ok(bytes) = hex::decode(strip_hex_prefix(trimmed)) {
        if !bytes.is_empty() {
            return bounded_signature(bytes);
        }
    }

    let payload = strip_data_url_prefix(trimmed);
    let decoded = BASE64_STANDARD.decode(payload).map_err(|err| {
        AssemblyError::validation(format!(
            "failed to decode signature as hex or base64: {err}"
        ))
    })?;
    bounded_signature(decoded)
}

/// Validates a submitted signature and returns its canonical base64 form.
pub fn canonical_signature(value: Option<String>) -> Result<Option<String>, AssemblyError> {
    match value {
        Some(raw) if !raw.trim().is_empty() => {
            let bytes = decode_signature(&raw)?;
            Ok(Some(BASE64_STANDARD.encode(bytes)))
        }
        _ => Ok(None),
    }
}

fn bounded_signature(bytes: Vec<u8>) -> Result<Vec<u8>, AssemblyError> {
    if bytes.is_empty() {
        return Err(AssemblyError::validation("signature cannot be empty"));
    }
    if bytes.len() > MAX_SIGNATURE_BYTES {
        return Err(AssemblyError::validation(format!(
            "signature exceeds {MAX_SIGNATURE_BYTES} byte limit"
        )));
    }
    Ok(bytes)
}

fn strip_hex_prefix(value: &str) -> &str {
    if value.starts_with("0x") || value.starts_with("0X") {
        &value[2..]
    } else {
        value
    }
}

// Signature pads usually submit `data:image/png;base64,...`.
fn strip_data_url_prefix(value: &str) -> &str {
    match value.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_decodes_hex_and_base64() {
        let hex_bytes = decode_signature("0xdeadbeef").expect("hex signature");
        assert_eq!(hex_bytes, vec![0xde, 0xad, 0xbe, 0xef]);

        let encoded = BASE64_STANDARD.encode([0xde, 0xad, 0xbe, 0xef, 0x01]);
        let base64_bytes = decode_signature(&encoded).expect("base64 signature");
        assert_eq!(base64_bytes, vec![0xde, 0xad, 0xbe, 0xef, 0x01]);

        let data_url = format!("data:image/png;base64,{encoded}");
        assert_eq!(decode_signature(&data_url).unwrap(), base64_bytes);
    }

    #[test]
    fn blank_signature_is_absent() {
        assert_eq!(canonical_signature(Some("   ".to_string())).unwrap(), None);
        assert_eq!(canonical_signature(None).unwrap(), None);
        assert!(canonical_signature(Some("not*valid".to_string())).is_err());
    }

    #[test]
    fn text_validation() {
        assert_eq!(required_text("  Annual assembly ", 64, "name").unwrap(), "Annual assembly");
        assert!(required_text("   ", 64, "name").is_err());
        assert!(required_text(&"x".repeat(65), 64, "name").is_err());
        assert_eq!(optional_text(Some(" ".to_string()), 10, "notes").unwrap(), None);
    }

    #[test]
    fn percentage_bounds() {
        assert!(percentage(Decimal::ZERO, "quorum").is_ok());
        assert!(percentage(Decimal::ONE_HUNDRED, "quorum").is_ok());
        assert!(percentage(Decimal::new(10001, 2), "quorum").is_err());
        assert!(percentage(Decimal::NEGATIVE_ONE, "quorum").is_err());
    }

    #[test]
    fn color_normalization() {
        assert_eq!(color(Some("#2E7D32".to_string())).unwrap().as_deref(), Some("#2e7d32"));
        assert_eq!(color(Some("f00".to_string())).unwrap().as_deref(), Some("#ff0000"));
        assert!(color(Some("#12345".to_string())).is_err());
        assert!(color(Some("#zzzzzz".to_string())).is_err());
    }
}
