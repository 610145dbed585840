//! WOFF 1.0 container.

use miniz_oxide::deflate::compress_to_vec_zlib;

use super::{pad_to_4_bytes, write_u16, write_u32, FontWriter, TableRecord};
use crate::FontContainer;

const WOFF_SIGNATURE: u32 = 0x_774f_4646;
const HEADER_LEN: usize = 44;
const TABLE_ENTRY_LEN: usize = 20;

impl TableRecord {
    fn write_woff(&self, offset: usize, compressed_len: usize, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.tag.0);
        write_u32(buffer, u32::try_from(offset).expect("WOFF table offset overflow"));
        write_u32(
            buffer,
            u32::try_from(compressed_len).expect("WOFF table length overflow"),
        );
        write_u32(buffer, self.length);
        write_u32(buffer, self.checksum);
    }
}

/// Encodes the container in the WOFF 1.0 format. Tables are compressed with zlib
/// at the specified level (0..=10) and stored uncompressed if compression doesn't help.
pub(crate) fn encode_woff(container: &FontContainer, compression_level: u8) -> Vec<u8> {
    let mut writer = FontWriter::new(container);
    writer.adjust_data_for_sfnt();
    let sfnt_len = writer.sfnt_len();

    let mut records = writer.tables.clone();
    records.sort_unstable_by_key(|record| record.tag);
    let data_offset = HEADER_LEN + TABLE_ENTRY_LEN * records.len();

    let mut directory = Vec::with_capacity(TABLE_ENTRY_LEN * records.len());
    let mut table_data = vec![];
    for record in &records {
        let table = writer.table_bytes(record);
        let compressed = compress_to_vec_zlib(table, compression_level.min(10));
        let stored = if compressed.len() < table.len() {
            compressed.as_slice()
        } else {
            table
        };
        log::trace!(
            "WOFF table `{}`: {} -> {} bytes",
            record.tag,
            table.len(),
            stored.len()
        );

        record.write_woff(data_offset + table_data.len(), stored.len(), &mut directory);
        table_data.extend_from_slice(stored);
        pad_to_4_bytes(&mut table_data);
    }

    let file_len = data_offset + table_data.len();
    let mut buffer = Vec::with_capacity(file_len);
    write_u32(&mut buffer, WOFF_SIGNATURE);
    write_u32(&mut buffer, writer.sfnt_version());
    write_u32(
        &mut buffer,
        u32::try_from(file_len).expect("file length overflow"),
    );
    write_u16(
        &mut buffer,
        u16::try_from(records.len()).expect("too many tables"),
    );
    write_u16(&mut buffer, 0); // reserved
    write_u32(
        &mut buffer,
        u32::try_from(sfnt_len).expect("sfnt length overflow"),
    );
    write_u16(&mut buffer, 1); // majorVersion
    write_u16(&mut buffer, 0); // minorVersion
    write_u32(&mut buffer, 0); // metaOffset
    write_u32(&mut buffer, 0); // metaLength
    write_u32(&mut buffer, 0); // metaOrigLength
    write_u32(&mut buffer, 0); // privOffset
    write_u32(&mut buffer, 0); // privLength
    debug_assert_eq!(buffer.len(), HEADER_LEN);

    buffer.extend(directory);
    buffer.extend(table_data);
    debug_assert_eq!(buffer.len(), file_len);
    buffer
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use allsorts::{binary::read::ReadScope, font_data::FontData, tables::FontTableProvider};
    use miniz_oxide::inflate::decompress_to_vec_zlib;
    use test_casing::test_casing;

    use super::*;
    use crate::{
        tests::{TestFont, TEST_FONTS},
        TableTag,
    };

    #[test_casing(2, TEST_FONTS)]
    fn woff_tables_are_read_by_allsorts(font: TestFont) {
        let container = FontContainer::parse(&font.bytes()).unwrap();
        let woff = encode_woff(&container, 9);
        assert_eq!(woff[..4], *b"wOFF");
        assert_eq!(woff.len() % 4, 0);

        let font_file = ReadScope::new(&woff).read::<FontData>().unwrap();
        let provider = font_file.table_provider(0).unwrap();
        for (tag, expected) in container.iter() {
            let mut actual = provider
                .read_table_data(u32::from_be_bytes(tag.0))
                .unwrap();
            if tag == TableTag::HEAD {
                let mut patched = actual.into_owned();
                patched[8..12].copy_from_slice(&expected[8..12]);
                actual = Cow::Owned(patched);
            }
            assert_eq!(actual.as_ref(), expected, "{tag}");
        }
        allsorts::Font::new(provider).unwrap();
    }

    #[test]
    fn woff_decodes_to_serialized_font() {
        let container = FontContainer::parse(&TestFont::Full.bytes()).unwrap();
        let sfnt = container.serialize();
        let woff = encode_woff(&container, 6);

        let read_u32 = |offset: usize| {
            u32::from_be_bytes(woff[offset..offset + 4].try_into().unwrap()) as usize
        };
        assert_eq!(read_u32(4), 0x_0001_0000);
        assert_eq!(read_u32(8), woff.len());
        assert_eq!(read_u32(16), sfnt.len());
        let table_count = usize::from(u16::from_be_bytes([woff[12], woff[13]]));
        assert_eq!(table_count, container.tags().len());

        let sfnt_container = FontContainer::parse(&sfnt).unwrap();
        let mut prev_tag = None;
        for i in 0..table_count {
            let entry = HEADER_LEN + i * TABLE_ENTRY_LEN;
            let tag = TableTag(woff[entry..entry + 4].try_into().unwrap());
            assert!(prev_tag < Some(tag), "directory must be sorted");
            prev_tag = Some(tag);

            let (offset, comp_len, orig_len) =
                (read_u32(entry + 4), read_u32(entry + 8), read_u32(entry + 12));
            assert_eq!(offset % 4, 0);
            let stored = &woff[offset..offset + comp_len];
            let data = if comp_len < orig_len {
                Cow::Owned(decompress_to_vec_zlib(stored).unwrap())
            } else {
                Cow::Borrowed(stored)
            };
            // `head` must contain the same `checkSumAdjustment` as the serialized font.
            assert_eq!(data.as_ref(), sfnt_container.table(tag).unwrap(), "{tag}");
        }
    }

    #[test]
    fn incompressible_tables_are_stored_raw() {
        let mut container = FontContainer::new(FontContainer::TRUETYPE_VERSION);
        container.set_table(TableTag(*b"abcd"), vec![1, 2, 3]);
        let woff = encode_woff(&container, 9);
        assert_eq!(woff.len(), HEADER_LEN + TABLE_ENTRY_LEN + 4);
        assert_eq!(woff[HEADER_LEN + 8..HEADER_LEN + 12], [0, 0, 0, 3]);
        assert_eq!(woff[HEADER_LEN + TABLE_ENTRY_LEN..], [1, 2, 3, 0]);
    }
}
