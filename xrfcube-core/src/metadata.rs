//! Metadata sidecar parsing.
//!
//! A sidecar is a plain text file where every meaningful line holds exactly
//! two whitespace-separated tokens, `key value`. Lines with any other token
//! count are skipped without error.

use std::collections::BTreeMap;

/// Width of the cube in pixels.
pub const KEY_WIDTH: &str = "width";
/// Height of the cube in pixels.
pub const KEY_HEIGHT: &str = "height";
/// Number of channels per pixel.
pub const KEY_DEPTH: &str = "depth";
/// Number of header bytes preceding the payload.
pub const KEY_OFFSET: &str = "offset";
/// Sample width in bytes.
pub const KEY_DATA_LENGTH: &str = "data-length";
/// Sample type (`unsigned`, `signed`, `float`).
pub const KEY_DATA_TYPE: &str = "data-type";
/// Sample byte order.
pub const KEY_BYTE_ORDER: &str = "byte-order";
/// Record interleaving (`vector`, `image`, `line`).
pub const KEY_RECORD_BY: &str = "record-by";
/// Energy of channel 0 in keV.
pub const KEY_SCALE_ORIGIN: &str = "depthscaleorigin";
/// Energy width of one channel in keV.
pub const KEY_SCALE_INCREMENT: &str = "depthscaleincrement";

/// Parsed key/value pairs of a metadata sidecar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

impl Metadata {
    /// Parses sidecar text.
    ///
    /// Later duplicates of a key replace earlier ones.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            if let (Some(key), Some(value), None) = (tokens.next(), tokens.next(), tokens.next()) {
                entries.insert(key.to_string(), value.to_string());
            }
        }
        Self { entries }
    }

    /// Returns the value for `key`, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.entries.get(key) {
            return Some(value.as_str());
        }
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Number of parsed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry was parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Replaces the value of `key` in sidecar `text`, keeping every other line.
///
/// The first line whose key matches (ignoring ASCII case) is rewritten as
/// `key<TAB>value`; when no such line exists one is appended.
#[must_use]
pub fn replace_value(text: &str, key: &str, value: &str) -> String {
    let mut out = String::with_capacity(text.len() + key.len() + value.len() + 2);
    let mut replaced = false;
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let matches = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(k), Some(_), None) => k.eq_ignore_ascii_case(key),
            _ => false,
        };
        if matches && !replaced {
            let original_key = line.split_whitespace().next().unwrap_or(key);
            out.push_str(original_key);
            out.push('\t');
            out.push_str(value);
            replaced = true;
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    if !replaced {
        out.push_str(key);
        out.push('\t');
        out.push_str(value);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIDECAR: &str = "key\tvalue\n\
        width 3\n\
        height\t3\n\
        depth 6\n\
        offset 0\n\
        data-Length 2\n\
        this line has too many tokens\n\
        lonely\n\
        \n\
        depthscaleorigin -0.956\n";

    #[test]
    fn test_parse_skips_malformed_lines() {
        let meta = Metadata::parse(SIDECAR);
        assert_eq!(meta.len(), 7);
        assert_eq!(meta.get("width"), Some("3"));
        assert_eq!(meta.get("depthscaleorigin"), Some("-0.956"));
        assert_eq!(meta.get("lonely"), None);
        assert_eq!(meta.get("this"), None);
    }

    #[test]
    fn test_get_ignores_case() {
        let meta = Metadata::parse(SIDECAR);
        assert_eq!(meta.get(KEY_DATA_LENGTH), Some("2"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(Metadata::parse("").is_empty());
        assert!(Metadata::parse("\n\n   \n").is_empty());
    }

    #[test]
    fn test_replace_value_keeps_other_lines() {
        let updated = replace_value(SIDECAR, KEY_DEPTH, "2");
        let meta = Metadata::parse(&updated);
        assert_eq!(meta.get(KEY_DEPTH), Some("2"));
        assert_eq!(meta.get(KEY_WIDTH), Some("3"));
        assert!(updated.contains("this line has too many tokens"));
    }

    #[test]
    fn test_replace_value_appends_missing_key() {
        let updated = replace_value("width 4\n", KEY_DEPTH, "16");
        assert_eq!(updated, "width 4\ndepth\t16\n");
    }
}
