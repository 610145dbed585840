//! `name` table processing.

use super::Cursor;
use crate::{FontContainer, ParseError, TableTag};

/// Human-readable font names extracted from the `name` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontNames {
    /// Font family name (name ID 1).
    pub family: Option<String>,
    /// Full font name (name ID 4).
    pub full: Option<String>,
}

impl FontNames {
    const FAMILY_NAME_ID: u16 = 1;
    const FULL_NAME_ID: u16 = 4;

    /// Extracts names from the container. For each name, the first non-empty record in the table
    /// is used, regardless of its platform.
    ///
    /// A missing or malformed `name` table leads to both names being `None`.
    pub fn extract(container: &FontContainer) -> Self {
        let Some(raw) = container.table(TableTag::NAME) else {
            return Self::default();
        };
        match Self::parse(Cursor::for_table(raw, TableTag::NAME)) {
            Ok(names) => names,
            Err(err) => {
                log::debug!("failed parsing `name` table: {err}");
                Self::default()
            }
        }
    }

    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let table_cursor = cursor;
        cursor.skip(2)?; // format
        let count = cursor.read_u16()?;
        let storage = table_cursor.at(cursor.read_u16()?.into())?;

        let mut this = Self::default();
        for _ in 0..count {
            cursor.skip(6)?; // platformID, encodingID, languageID
            let name_id = cursor.read_u16()?;
            let len = usize::from(cursor.read_u16()?);
            let offset = usize::from(cursor.read_u16()?);

            let slot = match name_id {
                Self::FAMILY_NAME_ID => &mut this.family,
                Self::FULL_NAME_ID => &mut this.full,
                _ => continue,
            };
            if slot.is_some() {
                continue;
            }
            let bytes = storage.range(offset..offset + len)?.bytes;
            let decoded = Self::decode(bytes);
            if !decoded.is_empty() {
                *slot = Some(decoded);
            }
        }
        Ok(this)
    }

    /// Decodes a name string. Strings containing zero bytes are treated as UTF-16BE;
    /// other strings are treated as Latin-1.
    fn decode(bytes: &[u8]) -> String {
        if bytes.contains(&0) {
            let units = bytes
                .chunks(2)
                .map(|chunk| match *chunk {
                    [hi, lo] => u16::from_be_bytes([hi, lo]),
                    [lo] => lo.into(),
                    _ => unreachable!("chunks have 1 or 2 bytes"),
                });
            char::decode_utf16(units)
                .map(|ch| ch.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        } else {
            bytes.iter().copied().map(char::from).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{name_table, NameRecord, TestFont};

    fn container_with_names(records: &[NameRecord<'_>]) -> FontContainer {
        let mut container = FontContainer::new(FontContainer::TRUETYPE_VERSION);
        container.set_table(TableTag::NAME, name_table(records));
        container
    }

    #[test]
    fn extracting_names_from_test_font() {
        let container = FontContainer::parse(&TestFont::Full.bytes()).unwrap();
        let names = FontNames::extract(&container);
        assert_eq!(names.family.as_deref(), Some("Test Sans"));
        assert_eq!(names.full.as_deref(), Some("Test Sans Regular"));
    }

    #[test]
    fn first_record_wins() {
        let container = container_with_names(&[
            NameRecord::mac(1, b"Caf\xe9"),
            NameRecord::windows(1, "Other Family"),
            NameRecord::windows(4, "Café Bold"),
        ]);
        let names = FontNames::extract(&container);
        assert_eq!(names.family.as_deref(), Some("Café"));
        assert_eq!(names.full.as_deref(), Some("Café Bold"));
    }

    #[test]
    fn empty_records_are_skipped() {
        let container = container_with_names(&[
            NameRecord::mac(1, b""),
            NameRecord::windows(1, "Family"),
        ]);
        let names = FontNames::extract(&container);
        assert_eq!(names.family.as_deref(), Some("Family"));
        assert_eq!(names.full, None);
    }

    #[test]
    fn unpaired_surrogates_are_replaced() {
        let container = container_with_names(&[NameRecord::mac(4, &[0xd8, 0x00, 0, b'A'])]);
        let names = FontNames::extract(&container);
        assert_eq!(names.full.as_deref(), Some("\u{fffd}A"));
    }

    #[test]
    fn missing_or_malformed_table() {
        let empty = FontContainer::new(FontContainer::TRUETYPE_VERSION);
        assert_eq!(FontNames::extract(&empty), FontNames::default());

        let mut container = container_with_names(&[NameRecord::windows(1, "Family")]);
        let mut raw = container.table(TableTag::NAME).unwrap().to_vec();
        raw.truncate(raw.len() - 4);
        container.set_table(TableTag::NAME, raw);
        assert_eq!(FontNames::extract(&container), FontNames::default());
    }
}
