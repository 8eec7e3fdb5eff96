//! Fixed-width layout of the tag record.
//!
//! The record is a 42-character ASCII string:
//! ```text
//! ┌──────┬──────────┬─────────┬─────────┬───────┬──────┬────────┬────────┬─────────┬──────┐
//! │ id   │ passcode │ konami  │ variant │ set   │ lang │ number │ rarity │ edition │ end  │
//! │ 0..4 │ 4..14    │ 14..22  │ 22..26  │ 26..30│30..32│ 32..35 │ 35..37 │ 37..39  │39..42│
//! └──────┴──────────┴─────────┴─────────┴───────┴──────┴────────┴────────┴─────────┴──────┘
//! ```
//! Encode and decode both slice through [`LAYOUT`], so the offsets live in one place.

use std::fmt;

/// Total encoded record length.
pub const RECORD_LEN: usize = 42;

/// Right-padding character for variable-content fields.
pub const FILLER: char = '-';

/// Required prefix of the identifier field.
pub const PRODUCT_PREFIX: &str = "YG";

/// Identifier written by the current format version.
pub const CURRENT_IDENTIFIER: &str = "YG01";

/// End marker closing every record.
pub const TERMINATOR: &str = "XXX";

/// Suffix appended to a record before it goes onto a tag or over the relay.
pub const TAG_SUFFIX: &str = "XX";

/// Registry id used when the konami id is unknown.
pub const UNKNOWN_KONAMI_ID: &str = "00000000";

/// Record fields in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Identifier,
    Passcode,
    KonamiId,
    Variant,
    SetId,
    Lang,
    Number,
    Rarity,
    Edition,
    Terminator,
}

impl Field {
    /// Returns the human-readable field name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Passcode => "passcode",
            Self::KonamiId => "konami id",
            Self::Variant => "variant",
            Self::SetId => "set id",
            Self::Lang => "language",
            Self::Number => "card number",
            Self::Rarity => "rarity",
            Self::Edition => "edition",
            Self::Terminator => "terminator",
        }
    }

    /// Returns where this field sits in the encoded record.
    #[must_use]
    pub const fn span(self) -> FieldSpan {
        LAYOUT[self as usize]
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Offset and width of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub field: Field,
    pub offset: usize,
    pub width: usize,
}

impl FieldSpan {
    const fn new(field: Field, offset: usize, width: usize) -> Self {
        Self {
            field,
            offset,
            width,
        }
    }

    /// Returns the exclusive end offset.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }

    /// Slices this field out of an encoded record.
    ///
    /// The caller must have checked the record length and that it is ASCII.
    #[must_use]
    pub fn slice<'a>(&self, encoded: &'a str) -> &'a str {
        &encoded[self.offset..self.end()]
    }
}

/// Field table shared by encode and decode. Indexed by `Field as usize`.
pub const LAYOUT: [FieldSpan; 10] = [
    FieldSpan::new(Field::Identifier, 0, 4),
    FieldSpan::new(Field::Passcode, 4, 10),
    FieldSpan::new(Field::KonamiId, 14, 8),
    FieldSpan::new(Field::Variant, 22, 4),
    FieldSpan::new(Field::SetId, 26, 4),
    FieldSpan::new(Field::Lang, 30, 2),
    FieldSpan::new(Field::Number, 32, 3),
    FieldSpan::new(Field::Rarity, 35, 2),
    FieldSpan::new(Field::Edition, 37, 2),
    FieldSpan::new(Field::Terminator, 39, 3),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_contiguous() {
        let mut offset = 0;
        for span in LAYOUT {
            assert_eq!(span.offset, offset, "{} starts at a gap", span.field);
            offset = span.end();
        }
        assert_eq!(offset, RECORD_LEN);
    }

    #[test]
    fn test_layout_indexed_by_field() {
        for (i, span) in LAYOUT.iter().enumerate() {
            assert_eq!(span.field as usize, i);
            assert_eq!(span.field.span(), *span);
        }
    }

    #[test]
    fn test_documented_offsets() {
        assert_eq!(Field::Passcode.span().offset, 4);
        assert_eq!(Field::KonamiId.span().offset, 14);
        assert_eq!(Field::Variant.span().offset, 22);
        assert_eq!(Field::SetId.span().offset, 26);
        assert_eq!(Field::Lang.span().offset, 30);
        assert_eq!(Field::Number.span().offset, 32);
        assert_eq!(Field::Rarity.span().offset, 35);
        assert_eq!(Field::Edition.span().offset, 37);
        assert_eq!(Field::Terminator.span().width, TERMINATOR.len());
    }

    #[test]
    fn test_slice() {
        let encoded = "YG0189631139--4007----0000LOB-EN001UR1EXXX";
        assert_eq!(Field::Identifier.span().slice(encoded), "YG01");
        assert_eq!(Field::Terminator.span().slice(encoded), "XXX");
    }
}
