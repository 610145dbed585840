//! sfnt container: table directory and raw table data.

use core::fmt;

use crate::{
    errors::{ParseError, ParseErrorKind},
    font::Cursor,
    write::FontWriter,
};

/// 4-byte tag of an OpenType table, such as `glyf` or `cmap`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableTag(pub [u8; 4]);

impl fmt::Debug for TableTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "TableTag({self})")
    }
}

impl fmt::Display for TableTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            let ch = if byte.is_ascii_graphic() || byte == b' ' {
                char::from(byte)
            } else {
                '?'
            };
            write!(formatter, "{ch}")?;
        }
        Ok(())
    }
}

#[allow(missing_docs)] // self-explanatory
impl TableTag {
    pub const AVAR: Self = Self(*b"avar");
    pub const CMAP: Self = Self(*b"cmap");
    pub const CPAL: Self = Self(*b"CPAL");
    pub const CVAR: Self = Self(*b"cvar");
    pub const CVT: Self = Self(*b"cvt ");
    pub const DSIG: Self = Self(*b"DSIG");
    pub const FPGM: Self = Self(*b"fpgm");
    pub const FVAR: Self = Self(*b"fvar");
    pub const GASP: Self = Self(*b"gasp");
    pub const GDEF: Self = Self(*b"GDEF");
    pub const GLYF: Self = Self(*b"glyf");
    pub const GPOS: Self = Self(*b"GPOS");
    pub const GSUB: Self = Self(*b"GSUB");
    pub const HEAD: Self = Self(*b"head");
    pub const HHEA: Self = Self(*b"hhea");
    pub const HMTX: Self = Self(*b"hmtx");
    pub const KERN: Self = Self(*b"kern");
    pub const LOCA: Self = Self(*b"loca");
    pub const MAXP: Self = Self(*b"maxp");
    pub const META: Self = Self(*b"meta");
    pub const MVAR: Self = Self(*b"MVAR");
    pub const NAME: Self = Self(*b"name");
    pub const OS2: Self = Self(*b"OS/2");
    pub const POST: Self = Self(*b"post");
    pub const PREP: Self = Self(*b"prep");
    pub const STAT: Self = Self(*b"STAT");
    pub const VHEA: Self = Self(*b"vhea");
    pub const VMTX: Self = Self(*b"vmtx");
}

/// Parsed sfnt container: an ordered collection of uniquely tagged tables.
///
/// The table directory (offsets, lengths and checksums) is not stored; it is recomputed
/// on [serialization](Self::serialize()), so it is always consistent with the table data.
/// Tables are kept in the order their data appears in the source file, and new tables
/// are appended to the end.
#[derive(Debug, Clone, PartialEq)]
pub struct FontContainer {
    sfnt_version: u32,
    tables: Vec<(TableTag, Vec<u8>)>,
}

impl FontContainer {
    /// Version of fonts with TrueType outlines.
    pub const TRUETYPE_VERSION: u32 = 0x_0001_0000;
    /// Alternative version of fonts with TrueType outlines used by Apple.
    pub const APPLE_TRUETYPE_VERSION: u32 = u32::from_be_bytes(*b"true");
    /// Version of fonts with CFF outlines.
    pub const CFF_VERSION: u32 = u32::from_be_bytes(*b"OTTO");

    pub(crate) const SFNT_CHECKSUM: u32 = 0x_b1b0_afba;
    pub(crate) const HEAD_CHECKSUM_OFFSET: usize = 8;

    /// Creates an empty container with the specified sfnt version.
    pub fn new(sfnt_version: u32) -> Self {
        Self {
            sfnt_version,
            tables: vec![],
        }
    }

    /// Parses a container from the provided bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not represent an sfnt container, e.g. if the header
    /// or the table directory is truncated, or if a table points outside the font data.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut cursor = Cursor::new(bytes);
        let sfnt_version = cursor.read_u32_checked(|version| match version {
            Self::TRUETYPE_VERSION | Self::APPLE_TRUETYPE_VERSION | Self::CFF_VERSION => {
                Ok(version)
            }
            _ => Err(ParseErrorKind::UnexpectedFontVersion(version)),
        })?;
        let table_count = cursor.read_u16()?;
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift

        let mut records = Vec::with_capacity(usize::from(table_count));
        for _ in 0..table_count {
            let record_cursor = cursor;
            let tag = TableTag(cursor.read_byte_array::<4>()?);
            cursor.skip(4)?; // checksum
            let offset = cursor.read_u32()? as usize;
            let len = cursor.read_u32()? as usize;

            if records.iter().any(|&(_, existing_tag, _)| existing_tag == tag) {
                let err = record_cursor.err(ParseErrorKind::DuplicateTable);
                return Err(err.with_table(tag));
            }
            let range = offset..offset.saturating_add(len);
            let data = bytes.get(range.clone()).ok_or_else(|| {
                let kind = ParseErrorKind::RangeOutOfBounds {
                    range,
                    len: bytes.len(),
                };
                record_cursor.err(kind).with_table(tag)
            })?;
            records.push((offset, tag, data));
        }

        // Stable sort, so tables with equal offsets (e.g., empty ones) retain directory order.
        records.sort_by_key(|&(offset, ..)| offset);
        let tables = records
            .into_iter()
            .map(|(_, tag, data)| (tag, data.to_vec()))
            .collect();
        Ok(Self {
            sfnt_version,
            tables,
        })
    }

    /// Returns the sfnt version of this container.
    pub fn sfnt_version(&self) -> u32 {
        self.sfnt_version
    }

    /// Checks whether this container has TrueType outlines.
    pub fn has_truetype_outlines(&self) -> bool {
        self.table(TableTag::GLYF).is_some()
    }

    /// Gets raw data for the table with the specified tag.
    pub fn table(&self, tag: TableTag) -> Option<&[u8]> {
        self.tables
            .iter()
            .find_map(|(table_tag, data)| (*table_tag == tag).then_some(data.as_slice()))
    }

    /// Sets table data. If the table is already present, its data is replaced in place;
    /// otherwise, the table is appended.
    pub fn set_table(&mut self, tag: TableTag, data: Vec<u8>) {
        if let Some((_, existing)) = self.tables.iter_mut().find(|(t, _)| *t == tag) {
            *existing = data;
        } else {
            self.tables.push((tag, data));
        }
    }

    /// Removes the table with the specified tag, returning its data.
    pub fn remove_table(&mut self, tag: TableTag) -> Option<Vec<u8>> {
        let idx = self.tables.iter().position(|(t, _)| *t == tag)?;
        Some(self.tables.remove(idx).1)
    }

    /// Lists tags of all tables in this container in the data order.
    pub fn tags(&self) -> Vec<TableTag> {
        self.tables.iter().map(|(tag, _)| *tag).collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (TableTag, &[u8])> + '_ {
        self.tables.iter().map(|(tag, data)| (*tag, data.as_slice()))
    }

    /// Serializes this container into the sfnt format, recomputing the table directory
    /// and checksums (including `checkSumAdjustment` in the `head` table).
    pub fn serialize(&self) -> Vec<u8> {
        FontWriter::new(self).into_opentype()
    }

    /// Computes the OpenType checksum of the provided data, padding it with zeros
    /// to a 4-byte boundary.
    pub(crate) fn checksum(data: &[u8]) -> u32 {
        let chunks = data.chunks_exact(4);
        let remainder = chunks.remainder();
        let mut sum = chunks.fold(0_u32, |acc, chunk| {
            let word = [chunk[0], chunk[1], chunk[2], chunk[3]];
            acc.wrapping_add(u32::from_be_bytes(word))
        });
        if !remainder.is_empty() {
            let mut word = [0_u8; 4];
            word[..remainder.len()].copy_from_slice(remainder);
            sum = sum.wrapping_add(u32::from_be_bytes(word));
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{TestFont, TEST_FONTS};
    use test_casing::test_casing;

    #[test]
    fn checksum_pads_trailing_bytes() {
        assert_eq!(FontContainer::checksum(&[]), 0);
        assert_eq!(FontContainer::checksum(&[0, 0, 0, 1]), 1);
        assert_eq!(FontContainer::checksum(&[0, 0, 0, 1, 0x80]), 0x_8000_0001);
        assert_eq!(
            FontContainer::checksum(&[0xff, 0xff, 0xff, 0xff, 0, 0, 0, 2]),
            1
        );
    }

    #[test_casing(2, TEST_FONTS)]
    fn round_trip_is_byte_identical(font: TestFont) {
        let bytes = font.bytes();
        let container = FontContainer::parse(&bytes).unwrap();
        assert_eq!(container.serialize(), bytes);

        let reparsed = FontContainer::parse(&container.serialize()).unwrap();
        assert_eq!(reparsed, container);
    }

    #[test]
    fn serialized_font_has_valid_checksums() {
        let bytes = TestFont::Full.bytes();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(
            FontContainer::checksum(&bytes),
            FontContainer::SFNT_CHECKSUM
        );

        let table_count = u16::from_be_bytes([bytes[4], bytes[5]]);
        let mut prev_tag = None;
        for i in 0..usize::from(table_count) {
            let record = &bytes[12 + 16 * i..28 + 16 * i];
            let tag = TableTag(record[..4].try_into().unwrap());
            assert!(prev_tag < Some(tag), "{prev_tag:?} >= {tag:?}");
            prev_tag = Some(tag);

            let checksum = u32::from_be_bytes(record[4..8].try_into().unwrap());
            let offset = u32::from_be_bytes(record[8..12].try_into().unwrap()) as usize;
            let len = u32::from_be_bytes(record[12..16].try_into().unwrap()) as usize;
            assert_eq!(offset % 4, 0);
            let mut data = bytes[offset..offset + len].to_vec();
            if tag == TableTag::HEAD {
                data[8..12].copy_from_slice(&[0; 4]);
            }
            assert_eq!(FontContainer::checksum(&data), checksum, "{tag}");
        }
    }

    #[test]
    fn table_manipulation() {
        let mut container = FontContainer::new(FontContainer::TRUETYPE_VERSION);
        container.set_table(TableTag::HEAD, vec![1; 54]);
        container.set_table(TableTag::NAME, vec![2; 7]);
        container.set_table(TableTag::HEAD, vec![3; 54]);
        assert_eq!(container.tags(), [TableTag::HEAD, TableTag::NAME]);
        assert_eq!(container.table(TableTag::HEAD), Some([3; 54].as_slice()));

        let bytes = container.serialize();
        let parsed = FontContainer::parse(&bytes).unwrap();
        assert_eq!(parsed.table(TableTag::NAME), Some([2; 7].as_slice()));

        assert_eq!(container.remove_table(TableTag::NAME), Some(vec![2; 7]));
        assert_eq!(container.remove_table(TableTag::NAME), None);
        assert_eq!(container.tags(), [TableTag::HEAD]);
    }

    #[test]
    fn parsing_errors() {
        let err = FontContainer::parse(b"wOF2\0\0\0\0").unwrap_err();
        assert!(
            matches!(err.kind(), ParseErrorKind::UnexpectedFontVersion(0x_774f_4632)),
            "{err}"
        );

        let err = FontContainer::parse(&[0, 1, 0, 0, 0]).unwrap_err();
        assert!(matches!(err.kind(), ParseErrorKind::UnexpectedEof), "{err}");

        let bytes = TestFont::Full.bytes();
        let err = FontContainer::parse(&bytes[..bytes.len() - 8]).unwrap_err();
        assert!(
            matches!(err.kind(), ParseErrorKind::RangeOutOfBounds { .. }),
            "{err}"
        );
        assert!(err.table().is_some());

        let mut duplicated = bytes.clone();
        let first_tag: [u8; 4] = bytes[12..16].try_into().unwrap();
        duplicated[28..32].copy_from_slice(&first_tag);
        let err = FontContainer::parse(&duplicated).unwrap_err();
        assert!(matches!(err.kind(), ParseErrorKind::DuplicateTable), "{err}");
        assert_eq!(err.table(), Some(TableTag(first_tag)));
    }

    #[test]
    fn tag_display() {
        assert_eq!(TableTag::OS2.to_string(), "OS/2");
        assert_eq!(TableTag::CVT.to_string(), "cvt ");
        assert_eq!(TableTag([0, b'a', b'b', b'c']).to_string(), "?abc");
    }
}
