//! Printed set code parsing.
//!
//! A printed code such as `LOB-EN001` splits into the set id (`LOB`), the language (`EN`) and the
//! card number (`001`). Older prints omit the language (`LOB-001`) or use a single letter
//! (`SDK-E001`).

/// Language used when the printed code carries none.
pub const UNKNOWN_LANG: &str = "XX";

/// Padding for one-letter language codes.
const LANG_PAD: char = 'X';

/// Components of a printed set code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCode {
    pub set_id: String,
    pub lang: String,
    pub number: String,
}

impl SetCode {
    /// Placeholder used when a set code cannot be parsed.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            set_id: "XXXX".to_owned(),
            lang: UNKNOWN_LANG.to_owned(),
            number: "XXX".to_owned(),
        }
    }

    /// Parses a printed set code.
    ///
    /// Matching is anchored at the start only: `<set>-<lang?><number>` where `set` and
    /// `number` are alphanumeric runs and `lang` is up to two letters. Anything after the
    /// number is ignored. Unparseable input yields [`SetCode::unknown`].
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::try_parse(text).unwrap_or_else(Self::unknown)
    }

    fn try_parse(text: &str) -> Option<Self> {
        let (set_id, rest) = text.split_once('-')?;
        if set_id.is_empty() || !set_id.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }

        let run = rest
            .bytes()
            .position(|b| !b.is_ascii_alphanumeric())
            .map_or(rest, |end| &rest[..end]);
        if run.is_empty() {
            return None;
        }

        // Greedy language prefix, giving back a letter if the number would be empty.
        let mut lang_len = run
            .bytes()
            .take(2)
            .take_while(u8::is_ascii_alphabetic)
            .count();
        if lang_len == run.len() {
            lang_len -= 1;
        }

        let (lang, number) = run.split_at(lang_len);
        let mut lang = lang.to_owned();
        if lang.is_empty() {
            lang.push_str(UNKNOWN_LANG);
        }
        while lang.len() < 2 {
            lang.push(LANG_PAD);
        }

        Some(Self {
            set_id: set_id.to_owned(),
            lang,
            number: number.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(code: &SetCode) -> (&str, &str, &str) {
        (&code.set_id, &code.lang, &code.number)
    }

    #[test]
    fn test_parse_full_code() {
        let code = SetCode::parse("LOB-EN001");
        assert_eq!(parts(&code), ("LOB", "EN", "001"));
    }

    #[test]
    fn test_parse_without_language() {
        let code = SetCode::parse("LOB-001");
        assert_eq!(parts(&code), ("LOB", "XX", "001"));
    }

    #[test]
    fn test_parse_single_letter_language() {
        let code = SetCode::parse("SDK-E001");
        assert_eq!(parts(&code), ("SDK", "EX", "001"));
    }

    #[test]
    fn test_parse_backtracks_language() {
        let code = SetCode::parse("ABC-EN");
        assert_eq!(parts(&code), ("ABC", "EX", "N"));

        let code = SetCode::parse("ABC-E");
        assert_eq!(parts(&code), ("ABC", "XX", "E"));
    }

    #[test]
    fn test_parse_ignores_trailing_text() {
        let code = SetCode::parse("MRD-EN036 (alt)");
        assert_eq!(parts(&code), ("MRD", "EN", "036"));
    }

    #[test]
    fn test_parse_alphanumeric_number() {
        let code = SetCode::parse("DUPO-ENA01");
        assert_eq!(parts(&code), ("DUPO", "EN", "A01"));
    }

    #[test]
    fn test_parse_fallback() {
        assert_eq!(SetCode::parse("LOB"), SetCode::unknown());
        assert_eq!(SetCode::parse("-EN001"), SetCode::unknown());
        assert_eq!(SetCode::parse("LOB-"), SetCode::unknown());
        assert_eq!(SetCode::parse("L*B-EN001"), SetCode::unknown());
    }
}
