//! Record line parser.
//!
//! Wire grammar: `field (";" field)*` with `field := key "=" value`.
//! There is no escaping. The line is trimmed once as a whole; individual
//! fields are taken verbatim.

use std::collections::BTreeMap;

/// Parsed channel values of one line, keyed by channel name.
pub type Fields = BTreeMap<String, f64>;

const FIELD_SEPARATOR: char = ';';
const KEY_VALUE_SEPARATOR: char = '=';

/// Parse one line into its usable fields.
///
/// Fields with a missing key, a missing value or a non-numeric value are
/// dropped. An empty result is not an error, it just means the line carried
/// no usable data.
pub fn parse_line(line: &str) -> Fields {
    line.trim()
        .split(FIELD_SEPARATOR)
        .filter_map(parse_field)
        .collect()
}

fn parse_field(field: &str) -> Option<(String, f64)> {
    let (key, raw) = field.split_once(KEY_VALUE_SEPARATOR)?;
    if key.is_empty() || raw.is_empty() {
        return None;
    }
    parse_number(raw).map(|value| (key.to_string(), value))
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_unusable_fields() {
        let fields = parse_line("A=1;B=2.5;C=xyz;=5;D=");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["A"], 1.0);
        assert_eq!(fields["B"], 2.5);
    }

    #[test]
    fn test_numeric_forms() {
        let fields = parse_line("N=-4;P=+7;E=1.5e3;F=.25;G=-2E-2");
        assert_eq!(fields["N"], -4.0);
        assert_eq!(fields["P"], 7.0);
        assert_eq!(fields["E"], 1500.0);
        assert_eq!(fields["F"], 0.25);
        assert_eq!(fields["G"], -0.02);
    }

    #[test]
    fn test_non_finite_values_rejected() {
        assert!(parse_line("A=inf;B=NaN;C=infinity").is_empty());
    }

    #[test]
    fn test_whole_line_trim_only() {
        let fields = parse_line("  TEMP=21; LIGHT=40;SOUND= 3  ");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["TEMP"], 21.0);
        // Inner whitespace is part of the key.
        assert_eq!(fields[" LIGHT"], 40.0);
        assert!(!fields.contains_key("SOUND"));
    }

    #[test]
    fn test_splits_on_first_equals() {
        let fields = parse_line("A=1=2;B=3");
        assert!(!fields.contains_key("A"));
        assert_eq!(fields["B"], 3.0);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let fields = parse_line("A=1;A=2");
        assert_eq!(fields["A"], 2.0);
    }

    #[test]
    fn test_no_usable_data() {
        assert!(parse_line("hello micro:bit").is_empty());
        assert!(parse_line("").is_empty());
        assert!(parse_line(";;;").is_empty());
    }
}
