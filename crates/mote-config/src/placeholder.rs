//! Device-unique identifier substitution in string fields.

use tracing::debug;

use crate::model::Config;
use crate::schema::TypedValue;

/// Marker replaced by identifier digits.
pub const PLACEHOLDER_CHAR: char = '?';

/// String fields that receive placeholder expansion after loading.
pub const PLACEHOLDER_FIELDS: &[&str] = &["wifi.ap.ssid"];

/// Upper-case hex rendering of an identifier, most significant byte first.
#[must_use]
pub fn hex_id(unique_id: &[u8]) -> String {
    unique_id.iter().map(|byte| format!("{byte:02X}")).collect()
}

/// Replace the markers in `text` with the hex digits of `unique_id`,
/// rightmost marker first with the least significant digit.
///
/// Nothing changes unless the marker count is non-zero, even, and no larger
/// than the number of hex digits available; a lone `?` stays a literal.
/// Returns whether the text changed.
pub fn expand_placeholders(text: &mut String, unique_id: &[u8]) -> bool {
    let markers = text.chars().filter(|c| *c == PLACEHOLDER_CHAR).count();
    let digits = hex_id(unique_id);
    if markers == 0 || markers % 2 != 0 || markers > digits.len() {
        return false;
    }
    let mut source = digits.chars().rev();
    let mut expanded: Vec<char> = text.chars().collect();
    for slot in expanded.iter_mut().rev() {
        if *slot == PLACEHOLDER_CHAR {
            if let Some(digit) = source.next() {
                *slot = digit;
            }
        }
    }
    *text = expanded.into_iter().collect();
    true
}

/// Expand placeholders in every designated string field of `cfg`.
pub fn expand_config_placeholders(cfg: &mut Config, unique_id: &[u8]) {
    for path in PLACEHOLDER_FIELDS {
        let Some(current) = cfg.get_str(path) else {
            continue;
        };
        let mut text = current.to_string();
        if expand_placeholders(&mut text, unique_id) {
            debug!(path = %path, value = %text, "expanded placeholders");
            if let Err(err) = cfg.set(path, TypedValue::Str(Some(text))) {
                debug!(path = %path, error = %err, "placeholder field is not a string");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    const MAC: [u8; 6] = [0x5C, 0xCF, 0x7F, 0x01, 0xA2, 0xB3];

    #[test]
    fn no_markers_leaves_text_unchanged() {
        let mut text = "plain".to_string();
        assert!(!expand_placeholders(&mut text, &MAC));
        assert_eq!(text, "plain");
    }

    #[test]
    fn twelve_markers_take_the_whole_identifier() {
        let mut text = "????????????".to_string();
        assert!(expand_placeholders(&mut text, &MAC));
        assert_eq!(text, "5CCF7F01A2B3");
    }

    #[test]
    fn rightmost_marker_gets_least_significant_digit() {
        let mut text = "Mote_??????".to_string();
        assert!(expand_placeholders(&mut text, &MAC));
        assert_eq!(text, "Mote_01A2B3");

        let mut split = "a??b??".to_string();
        assert!(expand_placeholders(&mut split, &MAC));
        assert_eq!(split, "aA2bB3");
    }

    #[test]
    fn odd_or_excessive_counts_are_literal() {
        let mut odd = "why???".to_string();
        assert!(!expand_placeholders(&mut odd, &MAC));
        assert_eq!(odd, "why???");

        let mut single = "ok?".to_string();
        assert!(!expand_placeholders(&mut single, &MAC));

        let mut too_many = "?".repeat(14);
        assert!(!expand_placeholders(&mut too_many, &MAC));
        assert_eq!(too_many, "?".repeat(14));
    }

    #[test]
    fn designated_fields_are_expanded_in_config() {
        let mut cfg = Config::from_schema(Schema::device());
        expand_config_placeholders(&mut cfg, &MAC);
        assert_eq!(cfg.get_str("wifi.ap.ssid"), Some("Mote_01A2B3"));
    }

    #[test]
    fn hex_id_is_upper_case() {
        assert_eq!(hex_id(&MAC), "5CCF7F01A2B3");
        assert_eq!(hex_id(&[]), "");
    }
}
