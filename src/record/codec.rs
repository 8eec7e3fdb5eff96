//! Encoding and decoding of [`CardRecord`]s.

use std::str::FromStr;

use crate::error::ValidationError;
use crate::record::layout::{
    CURRENT_IDENTIFIER, FILLER, Field, FieldSpan, LAYOUT, PRODUCT_PREFIX, RECORD_LEN, TAG_SUFFIX,
    TERMINATOR, UNKNOWN_KONAMI_ID,
};
use crate::record::set_code::SetCode;

/// Passcode placeholder the catalog uses for cards without a real one.
const PLACEHOLDER_PASSCODE: &str = "0000000000";

/// Rarity bound applied on encode.
const ENCODE_RARITY_MAX: usize = 2;

/// Rarity bound applied on decode. Looser than the encode bound.
const DECODE_RARITY_MAX: usize = 4;

/// Identity and print metadata of one physical card.
///
/// Values are held unpadded as entered; [`encode`] pads them to the fixed layout.
/// A decoded record keeps `set_id`, `rarity` and `edition` as sliced (filler included), while
/// `passcode` and `konami_id` come back with their trailing filler stripped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardRecord {
    /// Product tag plus format version, e.g. `YG01`.
    pub identifier: String,
    /// Catalog card id, 5 to 10 digits.
    pub passcode: String,
    /// External registry id, 1 to 8 digits. `00000000` when unknown.
    pub konami_id: String,
    /// Artwork selector, 4 digits.
    pub variant: String,
    /// Print set code, 3 or 4 characters.
    pub set_id: String,
    /// Language code, or `XX` when unknown.
    pub lang: String,
    /// Position within the set, 3 characters.
    pub number: String,
    /// Rarity code.
    pub rarity: String,
    /// Edition code.
    pub edition: String,
}

impl CardRecord {
    /// Builds the record for a catalog print.
    ///
    /// `konami_id` is the registry lookup result; `None` (or the placeholder passcode) yields
    /// the unknown sentinel.
    #[must_use]
    pub fn from_print(
        passcode: &str,
        konami_id: Option<&str>,
        set_code: &SetCode,
        rarity: &str,
        edition: &str,
    ) -> Self {
        let konami_id = match konami_id {
            Some(id) if passcode != PLACEHOLDER_PASSCODE => id,
            _ => UNKNOWN_KONAMI_ID,
        };

        Self {
            identifier: CURRENT_IDENTIFIER.to_owned(),
            passcode: passcode.to_owned(),
            konami_id: konami_id.to_owned(),
            variant: "0000".to_owned(),
            set_id: set_code.set_id.clone(),
            lang: set_code.lang.clone(),
            number: set_code.number.clone(),
            rarity: rarity.to_owned(),
            edition: edition.to_owned(),
        }
    }

    /// Encodes this record into its 42-character wire form.
    pub fn encode(&self) -> Result<String, ValidationError> {
        encode(self)
    }

    /// Decodes text read back from a tag.
    ///
    /// Tags carry the record followed by [`TAG_SUFFIX`]; the suffix is dropped before decoding.
    pub fn from_tag_text(text: &str) -> Result<Self, ValidationError> {
        let record = match text.strip_suffix(TAG_SUFFIX) {
            Some(stripped) if stripped.len() == RECORD_LEN => stripped,
            _ => text,
        };
        decode(record)
    }

    /// Returns the record with every field in its padded wire form, matching what [`decode`]
    /// produces for the encoded record.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            identifier: self.identifier.clone(),
            passcode: self.passcode.trim_end_matches(FILLER).to_owned(),
            konami_id: self.konami_id.trim_end_matches(FILLER).to_owned(),
            variant: self.variant.clone(),
            set_id: pad(&self.set_id, Field::SetId.span().width),
            lang: self.lang.clone(),
            number: self.number.clone(),
            rarity: pad(&self.rarity, Field::Rarity.span().width),
            edition: pad(&self.edition, Field::Edition.span().width),
        }
    }

    fn fields(&self) -> [(Field, &str); 9] {
        [
            (Field::Identifier, self.identifier.as_str()),
            (Field::Passcode, self.passcode.as_str()),
            (Field::KonamiId, self.konami_id.as_str()),
            (Field::Variant, self.variant.as_str()),
            (Field::SetId, self.set_id.as_str()),
            (Field::Lang, self.lang.as_str()),
            (Field::Number, self.number.as_str()),
            (Field::Rarity, self.rarity.as_str()),
            (Field::Edition, self.edition.as_str()),
        ]
    }
}

impl FromStr for CardRecord {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// Encodes a record into the fixed 42-character layout.
///
/// # Errors
///
/// Returns the first field rule the record breaks.
pub fn encode(record: &CardRecord) -> Result<String, ValidationError> {
    for (field, value) in record.fields() {
        if !is_wire_text(value) {
            return Err(ValidationError::NonAscii(field));
        }
    }

    check_identifier(&record.identifier)?;
    check_passcode(&record.passcode)?;
    check_konami_id(&record.konami_id)?;
    check_variant(&record.variant)?;
    check_set_id(&record.set_id)?;
    check_lang(&record.lang)?;
    check_number(&record.number)?;
    check_rarity(&record.rarity, ENCODE_RARITY_MAX)?;
    check_edition(&record.edition)?;

    for (field, value) in [
        (Field::SetId, &record.set_id),
        (Field::Rarity, &record.rarity),
        (Field::Edition, &record.edition),
    ] {
        if value.trim_end_matches(FILLER).contains(FILLER) {
            return Err(ValidationError::ReservedFiller(field));
        }
    }

    let mut out = String::with_capacity(RECORD_LEN);
    for (field, value) in record.fields() {
        push_padded(&mut out, value, field.span());
    }
    out.push_str(TERMINATOR);

    debug_assert_eq!(out.len(), RECORD_LEN);
    Ok(out)
}

/// Decodes and validates a 42-character record.
///
/// # Errors
///
/// Returns [`ValidationError::Length`] for any input that is not exactly 42 characters,
/// otherwise the first field rule the sliced values break.
pub fn decode(encoded: &str) -> Result<CardRecord, ValidationError> {
    let chars = encoded.chars().count();
    if chars != RECORD_LEN {
        return Err(ValidationError::Length {
            expected: RECORD_LEN,
            got: chars,
        });
    }
    if let Some(pos) = encoded.chars().position(|c| !is_wire_char(c)) {
        let field = LAYOUT
            .iter()
            .find(|span| pos < span.end())
            .map_or(Field::Terminator, |span| span.field);
        return Err(ValidationError::NonAscii(field));
    }

    let slice = |field: Field| field.span().slice(encoded);

    let identifier = slice(Field::Identifier);
    let passcode = slice(Field::Passcode).trim_end_matches(FILLER);
    let konami_id = slice(Field::KonamiId).trim_end_matches(FILLER);
    let variant = slice(Field::Variant);
    let set_id = slice(Field::SetId);
    let lang = slice(Field::Lang);
    let number = slice(Field::Number);
    let rarity = slice(Field::Rarity).trim();
    let edition = slice(Field::Edition).trim();

    check_identifier_prefix(identifier)?;
    check_passcode(passcode)?;
    check_konami_id(konami_id)?;
    check_variant(variant)?;
    check_set_id(set_id)?;
    check_lang(lang)?;
    check_number(number)?;
    check_rarity(rarity, DECODE_RARITY_MAX)?;
    check_edition(edition)?;

    Ok(CardRecord {
        identifier: identifier.to_owned(),
        passcode: passcode.to_owned(),
        konami_id: konami_id.to_owned(),
        variant: variant.to_owned(),
        set_id: set_id.to_owned(),
        lang: lang.to_owned(),
        number: number.to_owned(),
        rarity: rarity.to_owned(),
        edition: edition.to_owned(),
    })
}

fn is_wire_char(c: char) -> bool {
    c.is_ascii() && !c.is_ascii_control()
}

fn is_wire_text(value: &str) -> bool {
    value.chars().all(is_wire_char)
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn pad(value: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    out.push_str(value);
    while out.len() < width {
        out.push(FILLER);
    }
    out
}

fn push_padded(out: &mut String, value: &str, span: FieldSpan) {
    out.push_str(value);
    for _ in value.len()..span.width {
        out.push(FILLER);
    }
}

fn check_identifier(value: &str) -> Result<(), ValidationError> {
    if value.len() != Field::Identifier.span().width {
        return Err(ValidationError::Identifier(value.to_owned()));
    }
    check_identifier_prefix(value)
}

fn check_identifier_prefix(value: &str) -> Result<(), ValidationError> {
    if value.starts_with(PRODUCT_PREFIX) {
        Ok(())
    } else {
        Err(ValidationError::Identifier(value.to_owned()))
    }
}

fn check_passcode(value: &str) -> Result<(), ValidationError> {
    let width = Field::Passcode.span().width;
    if (5..=width).contains(&value.len()) && is_digits(value) {
        Ok(())
    } else {
        Err(ValidationError::Passcode(value.to_owned()))
    }
}

fn check_konami_id(value: &str) -> Result<(), ValidationError> {
    if is_digits(value) && value.len() <= Field::KonamiId.span().width {
        Ok(())
    } else {
        Err(ValidationError::KonamiId(value.to_owned()))
    }
}

fn check_variant(value: &str) -> Result<(), ValidationError> {
    if is_digits(value) && value.len() == Field::Variant.span().width {
        Ok(())
    } else {
        Err(ValidationError::Variant(value.to_owned()))
    }
}

fn check_set_id(value: &str) -> Result<(), ValidationError> {
    if value.len() > 2 && value.len() <= Field::SetId.span().width {
        Ok(())
    } else {
        Err(ValidationError::SetId(value.to_owned()))
    }
}

fn check_lang(value: &str) -> Result<(), ValidationError> {
    if value.len() == Field::Lang.span().width {
        Ok(())
    } else {
        Err(ValidationError::Lang(value.to_owned()))
    }
}

fn check_number(value: &str) -> Result<(), ValidationError> {
    if value.len() == Field::Number.span().width {
        Ok(())
    } else {
        Err(ValidationError::Number(value.to_owned()))
    }
}

fn check_rarity(value: &str, max: usize) -> Result<(), ValidationError> {
    if value.len() <= max {
        Ok(())
    } else {
        Err(ValidationError::Rarity {
            value: value.to_owned(),
            max,
        })
    }
}

fn check_edition(value: &str) -> Result<(), ValidationError> {
    if value.len() <= Field::Edition.span().width {
        Ok(())
    } else {
        Err(ValidationError::Edition(value.to_owned()))
    }
}
