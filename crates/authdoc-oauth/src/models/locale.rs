//! Locale-keyed display strings.
//!
//! Localized names and descriptions are stored as maps keyed by normalized
//! BCP 47-style tags (`en-US`, `zh-Hant-TW`). Keys are normalized on write
//! and looked up with prefix fallback on read.

use std::collections::BTreeMap;

/// Localized strings keyed by normalized language tag.
pub type LocalizedStrings = BTreeMap<String, String>;

/// Normalizes a language tag.
///
/// Subtags may be separated by `-` or `_`. The language is lowercased, a
/// two-letter region uppercased and a four-letter script title-cased.
#[must_use]
pub fn normalize(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .enumerate()
        .map(|(position, part)| normalize_subtag(position, part))
        .collect::<Vec<_>>()
        .join("-")
}

fn normalize_subtag(position: usize, part: &str) -> String {
    let alphabetic = part.chars().all(|c| c.is_ascii_alphabetic());
    match (position, part.len()) {
        (0, _) => part.to_ascii_lowercase(),
        (_, 2) if alphabetic => part.to_ascii_uppercase(),
        (_, 4) if alphabetic => {
            let lower = part.to_ascii_lowercase();
            let mut chars = lower.chars();
            chars
                .next()
                .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
                .unwrap_or_default()
        }
        _ => part.to_ascii_lowercase(),
    }
}

/// Rebuilds a map with normalized keys. Entries whose key normalizes to an
/// empty tag are dropped; on collisions the last entry wins.
#[must_use]
pub fn normalize_map<I, K, V>(entries: I) -> LocalizedStrings
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    entries
        .into_iter()
        .filter_map(|(tag, value)| {
            let tag = normalize(tag.as_ref());
            (!tag.is_empty()).then(|| (tag, value.into()))
        })
        .collect()
}

/// Finds the string for `tag`, falling back along the tag's prefixes
/// (`zh-Hant-TW`, then `zh-Hant`, then `zh`).
#[must_use]
pub fn lookup<'a>(strings: &'a LocalizedStrings, tag: &str) -> Option<&'a str> {
    let mut candidate = normalize(tag);
    loop {
        if candidate.is_empty() {
            return None;
        }
        if let Some(value) = strings.get(&candidate) {
            return Some(value);
        }
        match candidate.rfind('-') {
            Some(cut) => candidate.truncate(cut),
            None => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tags() {
        assert_eq!(normalize("en_us"), "en-US");
        assert_eq!(normalize("EN-gb"), "en-GB");
        assert_eq!(normalize("zh-hant-tw"), "zh-Hant-TW");
        assert_eq!(normalize("es-419"), "es-419");
        assert_eq!(normalize(" fr "), "fr");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_map_drops_empty_tags() {
        let map = normalize_map([("en_us", "Hello"), ("", "ignored"), ("FR", "Bonjour")]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["en-US"], "Hello");
        assert_eq!(map["fr"], "Bonjour");
    }

    #[test]
    fn test_lookup_falls_back_to_prefix() {
        let map = normalize_map([("zh-Hant", "繁體"), ("en", "English")]);
        assert_eq!(lookup(&map, "zh_hant_tw"), Some("繁體"));
        assert_eq!(lookup(&map, "en-AU"), Some("English"));
        assert_eq!(lookup(&map, "de-DE"), None);
        assert_eq!(lookup(&map, ""), None);
    }
}
