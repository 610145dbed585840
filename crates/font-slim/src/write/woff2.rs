//! WOFF2 container.

use super::{
    brotli, glyf_transform::GlyfTransform, pad_to_4_bytes, write_u16, write_u32, FontWriter,
    TableRecord,
};
use crate::{font::GlyphData, FontContainer, TableTag};

const WOFF2_SIGNATURE: u32 = 0x_774f_4632;
const HEADER_LEN: usize = 48;
/// Table index signalling that an explicit tag follows the flags byte.
const ARBITRARY_TAG_IDX: u8 = 63;
/// Transform version 3, which is the null transform for `glyf` and `loca`.
const NULL_TRANSFORM: u8 = 0b_1100_0000;

/// Offset of `flags` in the `head` table.
const HEAD_FLAGS_OFFSET: usize = 16;
/// `head.flags` bit signalling that the font was subjected to a lossless transform (bit 11).
const HEAD_FLAG_TRANSFORMED: u16 = 1 << 11;

/// Tags with a 6-bit shorthand in the table directory.
const KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];

fn known_tag_index(tag: TableTag) -> Option<u8> {
    KNOWN_TAGS
        .iter()
        .zip(0_u8..)
        .find_map(|(known, idx)| (**known == tag.0).then_some(idx))
}

fn uint_base128_len(val: u32) -> usize {
    if val == 0 {
        1
    } else {
        val.ilog2() as usize / 7 + 1
    }
}

#[allow(clippy::cast_possible_truncation)] // intentional
fn write_uint_base128(buffer: &mut Vec<u8>, val: u32) {
    if val >= 1 << 28 {
        buffer.push(0x80 | (val >> 28) as u8);
    }
    if val >= 1 << 21 {
        buffer.push(0x80 | (val >> 21) as u8);
    }
    if val >= 1 << 14 {
        buffer.push(0x80 | (val >> 14) as u8);
    }
    if val >= 1 << 7 {
        buffer.push(0x80 | (val >> 7) as u8);
    }
    buffer.push((val & 127) as u8);
}

impl TableRecord {
    fn woff2_len(&self, transform_len: Option<u32>) -> usize {
        let tag_len = if known_tag_index(self.tag).is_some() {
            0
        } else {
            4
        };
        1 /* flags */ + tag_len + uint_base128_len(self.length)
            + transform_len.map_or(0, uint_base128_len)
    }

    /// Writes a directory entry. `transform_len` is specified for transformed `glyf` / `loca` tables.
    fn write_woff2(&self, transform_len: Option<u32>, buffer: &mut Vec<u8>) {
        let tag_idx = known_tag_index(self.tag);
        let version = match (self.tag, transform_len) {
            (TableTag::GLYF | TableTag::LOCA, None) => NULL_TRANSFORM,
            _ => 0,
        };
        buffer.push(tag_idx.unwrap_or(ARBITRARY_TAG_IDX) | version);
        if tag_idx.is_none() {
            buffer.extend_from_slice(&self.tag.0);
        }
        write_uint_base128(buffer, self.length);
        if let Some(transform_len) = transform_len {
            write_uint_base128(buffer, transform_len);
        }
    }
}

/// Orders the table directory by tag, with `loca` placed immediately after `glyf`.
fn order_records(records: &mut Vec<TableRecord>) {
    records.sort_unstable_by_key(|record| record.tag);
    let loca_pos = records.iter().position(|rec| rec.tag == TableTag::LOCA);
    let glyf_pos = records.iter().position(|rec| rec.tag == TableTag::GLYF);
    if let (Some(loca_pos), Some(glyf_pos)) = (loca_pos, glyf_pos) {
        let loca = records.remove(loca_pos);
        let glyf_pos = if loca_pos < glyf_pos {
            glyf_pos - 1
        } else {
            glyf_pos
        };
        records.insert(glyf_pos + 1, loca);
    }
}

fn transform_glyf(container: &FontContainer) -> Option<GlyfTransform> {
    if container.table(TableTag::GLYF).is_none() || container.table(TableTag::LOCA).is_none() {
        return None;
    }
    let result = GlyphData::new(container).and_then(|glyphs| GlyfTransform::new(&glyphs));
    match result {
        Ok(transform) => Some(transform),
        Err(err) => {
            log::debug!("cannot transform `glyf` table, falling back to null transform: {err}");
            None
        }
    }
}

/// Sets the "losslessly transformed" bit in `head.flags`. This must happen before checksums
/// are computed, since decoders reconstruct the font with the bit set.
fn mark_as_transformed(container: &FontContainer) -> Option<FontContainer> {
    let mut head = container.table(TableTag::HEAD)?.to_vec();
    let flags = head.get_mut(HEAD_FLAGS_OFFSET..HEAD_FLAGS_OFFSET + 2)?;
    let patched = u16::from_be_bytes([flags[0], flags[1]]) | HEAD_FLAG_TRANSFORMED;
    flags.copy_from_slice(&patched.to_be_bytes());

    let mut container = container.clone();
    container.set_table(TableTag::HEAD, head);
    Some(container)
}

/// Encodes the container in the WOFF2 format. All table data is compressed as a single Brotli stream
/// with the specified quality (0..=11). If `transform_glyf` is set, `glyf` / `loca` tables are stored
/// in the transformed form where possible.
pub(crate) fn encode_woff2(
    container: &FontContainer,
    quality: u8,
    transform_glyf: bool,
) -> Vec<u8> {
    let transform = if transform_glyf {
        self::transform_glyf(container)
    } else {
        None
    };
    let marked = transform.as_ref().and_then(|_| mark_as_transformed(container));
    let container = marked.as_ref().unwrap_or(container);

    let mut writer = FontWriter::new(container);
    writer.adjust_data_for_sfnt();
    let mut total_sfnt_len = writer.sfnt_len();

    let mut records = writer.tables.clone();
    order_records(&mut records);

    let mut directory = vec![];
    let mut chunks = Vec::with_capacity(records.len());
    for record in &records {
        let transform_len = match (record.tag, &transform) {
            (TableTag::GLYF, Some(transform)) => {
                chunks.push(transform.data.as_slice());
                let glyf_len = record.length as usize;
                total_sfnt_len += transform.reconstructed_len_bound.saturating_sub(glyf_len);
                Some(u32::try_from(transform.data.len()).expect("glyf length overflow"))
            }
            // The transformed `loca` table is fully reconstructed from `glyf`.
            (TableTag::LOCA, Some(_)) => Some(0),
            _ => {
                chunks.push(writer.table_bytes(record));
                None
            }
        };
        let prev_len = directory.len();
        record.write_woff2(transform_len, &mut directory);
        debug_assert_eq!(directory.len() - prev_len, record.woff2_len(transform_len));
    }

    let uncompressed_len = chunks.iter().map(|chunk| chunk.len()).sum::<usize>();
    let compressed_data = brotli::compress(&chunks, quality);
    log::trace!(
        "WOFF2 table data: {uncompressed_len} -> {} bytes",
        compressed_data.len()
    );

    let mut file_len = HEADER_LEN + directory.len() + compressed_data.len();
    if file_len % 4 != 0 {
        file_len += 4 - file_len % 4;
    }

    let mut buffer = Vec::with_capacity(file_len);
    write_u32(&mut buffer, WOFF2_SIGNATURE);
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
        u32::try_from(total_sfnt_len).expect("sfnt length overflow"),
    );
    write_u32(
        &mut buffer,
        u32::try_from(compressed_data.len()).expect("compressed data length overflow"),
    );
    write_u16(&mut buffer, 1); // majorVersion
    write_u16(&mut buffer, 0); // minorVersion
    write_u32(&mut buffer, 0); // metadata offset
    write_u32(&mut buffer, 0); // metadata length
    write_u32(&mut buffer, 0); // original metadata length
    write_u32(&mut buffer, 0); // private block offset
    write_u32(&mut buffer, 0); // private block length
    debug_assert_eq!(buffer.len(), HEADER_LEN);

    buffer.extend(directory);
    buffer.extend(compressed_data);
    // Required even though there are no metadata or private blocks.
    pad_to_4_bytes(&mut buffer);
    debug_assert_eq!(buffer.len(), file_len);
    buffer
}
