//! Shared test fixtures and end-to-end tests.
//!
//! Test fonts are built in code, so that every table has known contents.

use std::{
    borrow::Cow, collections::BTreeSet, env, fmt, io::Write, ops, process::Command, sync::OnceLock,
};

use allsorts::{binary::read::ReadScope, font::MatchingPresentation, font_data::FontData};
use test_casing::{test_casing, Product};

use crate::{
    font::{CmapTable, GlyphComponent, LocaTable, Metrics, MetricsTable},
    pipeline::{run, Request},
    write::{write_u16, write_u32},
    Font, FontContainer, GlyphRenumbering, OutputFormat, TableTag,
};

type Contour<'a> = &'a [(i16, i16, bool)];

/// Encodes a simple glyph. The bounding box is computed from the points.
pub(crate) fn simple_glyph(contours: &[Contour<'_>], instructions: &[u8]) -> Vec<u8> {
    const ON_CURVE_POINT: u8 = 0x01;
    const X_SHORT_VECTOR: u8 = 0x02;
    const Y_SHORT_VECTOR: u8 = 0x04;
    const REPEAT_FLAG: u8 = 0x08;
    const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
    const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;

    fn encode_delta(delta: i16, short: u8, same_or_positive: u8, flag: &mut u8, out: &mut Vec<u8>) {
        if delta == 0 {
            *flag |= same_or_positive;
        } else if let Ok(abs) = u8::try_from(delta.unsigned_abs()) {
            *flag |= short;
            if delta > 0 {
                *flag |= same_or_positive;
            }
            out.push(abs);
        } else {
            out.extend_from_slice(&delta.to_be_bytes());
        }
    }

    let points: Vec<_> = contours.iter().flat_map(|contour| contour.iter()).collect();
    let bbox = [
        points.iter().map(|pt| pt.0).min().unwrap_or(0),
        points.iter().map(|pt| pt.1).min().unwrap_or(0),
        points.iter().map(|pt| pt.0).max().unwrap_or(0),
        points.iter().map(|pt| pt.1).max().unwrap_or(0),
    ];

    let mut bytes = vec![];
    write_u16(&mut bytes, u16::try_from(contours.len()).unwrap());
    for value in bbox {
        bytes.extend_from_slice(&value.to_be_bytes());
    }
    let mut end_point = 0;
    for contour in contours {
        end_point += contour.len();
        write_u16(&mut bytes, u16::try_from(end_point - 1).unwrap());
    }
    write_u16(&mut bytes, u16::try_from(instructions.len()).unwrap());
    bytes.extend_from_slice(instructions);

    let (mut flags, mut xs, mut ys) = (vec![], vec![], vec![]);
    let mut prev = (0, 0);
    for &&(x, y, on_curve) in &points {
        let mut flag = if on_curve { ON_CURVE_POINT } else { 0 };
        encode_delta(x - prev.0, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE, &mut flag, &mut xs);
        encode_delta(y - prev.1, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE, &mut flag, &mut ys);
        flags.push(flag);
        prev = (x, y);
    }

    let mut i = 0;
    while i < flags.len() {
        let flag = flags[i];
        let repeats = flags[i + 1..]
            .iter()
            .take(255)
            .take_while(|&&next| next == flag)
            .count();
        if repeats > 0 {
            bytes.extend_from_slice(&[flag | REPEAT_FLAG, u8::try_from(repeats).unwrap()]);
        } else {
            bytes.push(flag);
        }
        i += 1 + repeats;
    }
    bytes.extend(xs);
    bytes.extend(ys);
    bytes
}

/// Encodes a composite glyph with `(glyph_idx, dx, dy)` components.
pub(crate) fn composite_glyph(components: &[(u16, i16, i16)], with_instructions: bool) -> Vec<u8> {
    const ARGS_ARE_XY_VALUES: u16 = 0x0002;

    let mut bytes = vec![];
    write_u16(&mut bytes, u16::MAX); // numberOfContours = -1
    bytes.extend_from_slice(&[0, 0, 0, 0, 1, 0xf4, 2, 0xbc]); // bbox: (0, 0, 500, 700)
    for (i, &(glyph_idx, dx, dy)) in components.iter().enumerate() {
        let mut flags = GlyphComponent::ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES;
        if i + 1 < components.len() {
            flags |= GlyphComponent::MORE_COMPONENTS;
        } else if with_instructions {
            flags |= GlyphComponent::WE_HAVE_INSTRUCTIONS;
        }
        write_u16(&mut bytes, flags);
        write_u16(&mut bytes, glyph_idx);
        bytes.extend_from_slice(&dx.to_be_bytes());
        bytes.extend_from_slice(&dy.to_be_bytes());
    }
    if with_instructions {
        bytes.extend_from_slice(&[0, 2, 0xb0, 0x00]);
    }
    bytes
}

#[derive(Debug, Clone)]
pub(crate) struct NameRecord<'a> {
    platform_id: u16,
    encoding_id: u16,
    language_id: u16,
    name_id: u16,
    data: Cow<'a, [u8]>,
}

impl<'a> NameRecord<'a> {
    /// Mac Roman record with raw single-byte data.
    pub(crate) fn mac(name_id: u16, data: &'a [u8]) -> Self {
        Self {
            platform_id: 1,
            encoding_id: 0,
            language_id: 0,
            name_id,
            data: Cow::Borrowed(data),
        }
    }

    /// Windows Unicode BMP record (UTF-16BE).
    pub(crate) fn windows(name_id: u16, text: &str) -> Self {
        Self {
            platform_id: 3,
            encoding_id: 1,
            language_id: 0x409,
            name_id,
            data: Cow::Owned(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        }
    }
}

pub(crate) fn name_table(records: &[NameRecord<'_>]) -> Vec<u8> {
    let count = u16::try_from(records.len()).unwrap();
    let mut bytes = vec![];
    write_u16(&mut bytes, 0); // format
    write_u16(&mut bytes, count);
    write_u16(&mut bytes, 6 + 12 * count);
    let mut storage = vec![];
    for record in records {
        for value in [
            record.platform_id,
            record.encoding_id,
            record.language_id,
            record.name_id,
            u16::try_from(record.data.len()).unwrap(),
            u16::try_from(storage.len()).unwrap(),
        ] {
            write_u16(&mut bytes, value);
        }
        storage.extend_from_slice(&record.data);
    }
    bytes.extend(storage);
    bytes
}

/// Version 0 `kern` table with a single format 0 subtable.
pub(crate) fn kern_table(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
    let pair_count = u16::try_from(pairs.len()).unwrap();
    let entry_selector = pair_count.checked_ilog2().unwrap_or(0);
    let search_range = 6_u16 << entry_selector;

    let mut bytes = vec![];
    for value in [
        0, // version
        1, // nTables
        0, // subtable version
        14 + 6 * pair_count,
        1, // coverage: horizontal, format 0
        pair_count,
        search_range,
        u16::try_from(entry_selector).unwrap(),
        (6 * pair_count).saturating_sub(search_range),
    ] {
        write_u16(&mut bytes, value);
    }
    for &(left, right, value) in pairs {
        write_u16(&mut bytes, left);
        write_u16(&mut bytes, right);
        bytes.extend_from_slice(&value.to_be_bytes());
    }
    bytes
}

/// Renumbering for the glyph closure of `chars`.
pub(crate) fn renumbering(font: &Font<'_>, chars: &str) -> GlyphRenumbering {
    let chars: BTreeSet<_> = chars.chars().collect();
    GlyphRenumbering::new(&font.glyph_closure(&chars).unwrap())
}

fn words(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_be_bytes()).collect()
}

fn len16(bytes: &[u8]) -> u16 {
    u16::try_from(bytes.len()).unwrap()
}

/// `GSUB` table of the full test font:
///
/// - Scripts: `DFLT` (features 0, 1), `latn` (features 0, 1; `TRK ` language with feature 0)
/// - Features: `liga` -> lookup 0, `smcp` -> lookups 1, 2
/// - Lookups: ligature `f` + `i` -> `fi` (4 + 6 -> 7); extension-wrapped single substitution
///   2 -> 3; chained context applying lookup 1 to glyph 2 preceded by glyph 1
fn gsub_table() -> Vec<u8> {
    let lang_sys = |features: &[u16]| {
        let mut bytes = words(&[0, 0xffff, len16(&words(features)) / 2]);
        bytes.extend(words(features));
        bytes
    };

    let mut default_script = words(&[4, 0]);
    default_script.extend(lang_sys(&[0, 1]));
    let latn_default = lang_sys(&[0, 1]);
    let mut latn_script = words(&[10, 1]);
    latn_script.extend_from_slice(b"TRK ");
    latn_script.extend(words(&[10 + len16(&latn_default)]));
    latn_script.extend(latn_default);
    latn_script.extend(lang_sys(&[0]));

    let mut script_list = words(&[2]);
    script_list.extend_from_slice(b"DFLT");
    script_list.extend(words(&[14]));
    script_list.extend_from_slice(b"latn");
    script_list.extend(words(&[14 + len16(&default_script)]));
    script_list.extend(default_script);
    script_list.extend(latn_script);

    let mut feature_list = words(&[2]);
    feature_list.extend_from_slice(b"liga");
    feature_list.extend(words(&[14]));
    feature_list.extend_from_slice(b"smcp");
    feature_list.extend(words(&[20]));
    feature_list.extend(words(&[0, 1, 0])); // liga
    feature_list.extend(words(&[0, 2, 1, 2])); // smcp

    let mut ligature_lookup = words(&[4, 0, 1, 8]);
    ligature_lookup.extend(words(&[
        1, 8, 1, 14, // format, coverage offset, ligature set count + offset
        1, 1, 4, // coverage
        1, 4, // ligature set
        7, 2, 6, // ligature
    ]));
    let mut extension_lookup = words(&[7, 0, 1, 8]);
    extension_lookup.extend(words(&[1, 1, 0, 8])); // extension subtable with 32-bit offset
    extension_lookup.extend(words(&[
        2, 8, 1, 3, // single substitution, format 2
        1, 1, 2, // coverage
    ]));
    let mut context_lookup = words(&[6, 0, 1, 8]);
    context_lookup.extend(words(&[
        3, 1, 18, 1, 24, 0, // format 3; backtrack, input and lookahead coverages
        1, 0, 1, // sequence lookup: input position 0 -> lookup 1
        1, 1, 1, // backtrack coverage
        1, 1, 2, // input coverage
    ]));

    let lookup_offsets = [
        8,
        8 + len16(&ligature_lookup),
        8 + len16(&ligature_lookup) + len16(&extension_lookup),
    ];
    let mut lookup_list = words(&[3]);
    lookup_list.extend(words(&lookup_offsets));
    lookup_list.extend(ligature_lookup);
    lookup_list.extend(extension_lookup);
    lookup_list.extend(context_lookup);

    let feature_list_offset = 10 + len16(&script_list);
    let lookup_list_offset = feature_list_offset + len16(&feature_list);
    let mut bytes = words(&[1, 0, 10, feature_list_offset, lookup_list_offset]);
    bytes.extend(script_list);
    bytes.extend(feature_list);
    bytes.extend(lookup_list);
    bytes
}

/// `GPOS` table of the full test font:
///
/// - Scripts: `DFLT` (features 0, 1)
/// - Features: `kern` -> lookups 0, 1; `cpsp` -> lookup 2
/// - Lookups: pair adjustments by glyph (1, 2: -50; 1, 6: -10; 2, 3: -20); pair adjustments
///   by class (4 followed by 6 or 7: -30); single adjustment of glyph 8 (y placement: 100)
fn gpos_table() -> Vec<u8> {
    let mut script_list = words(&[1]);
    script_list.extend_from_slice(b"DFLT");
    script_list.extend(words(&[8, 4, 0, 0, 0xffff, 2, 0, 1]));

    let mut feature_list = words(&[2]);
    feature_list.extend_from_slice(b"kern");
    feature_list.extend(words(&[14]));
    feature_list.extend_from_slice(b"cpsp");
    feature_list.extend(words(&[22]));
    feature_list.extend(words(&[0, 2, 0, 1])); // kern
    feature_list.extend(words(&[0, 1, 2])); // cpsp

    let mut pair_lookup = words(&[2, 0, 1, 8]);
    pair_lookup.extend(words(&[
        1, 30, 4, 0, 2, 14, 24, // format 1, coverage, value formats, pair set offsets
        2, 2, 0xffce, 6, 0xfff6, // pair set for glyph 1
        1, 3, 0xffec, // pair set for glyph 2
        1, 2, 1, 2, // coverage
    ]));
    let mut class_pair_lookup = words(&[2, 0, 1, 8]);
    class_pair_lookup.extend(words(&[
        2, 24, 4, 0, 30, 38, 2, 2, // format 2, offsets, value formats, class counts
        0, 0, 0, 0xffe2, // values by class
        1, 1, 4, // coverage
        1, 4, 1, 1, // first glyph classes (format 1)
        2, 1, 6, 7, 1, // second glyph classes (format 2)
    ]));
    let mut single_lookup = words(&[1, 0, 1, 8]);
    single_lookup.extend(words(&[1, 8, 2, 100, 1, 1, 8]));

    let lookup_offsets = [
        8,
        8 + len16(&pair_lookup),
        8 + len16(&pair_lookup) + len16(&class_pair_lookup),
    ];
    let mut lookup_list = words(&[3]);
    lookup_list.extend(words(&lookup_offsets));
    lookup_list.extend(pair_lookup);
    lookup_list.extend(class_pair_lookup);
    lookup_list.extend(single_lookup);

    let feature_list_offset = 10 + len16(&script_list);
    let lookup_list_offset = feature_list_offset + len16(&feature_list);
    let mut bytes = words(&[1, 0, 10, feature_list_offset, lookup_list_offset]);
    bytes.extend(script_list);
    bytes.extend(feature_list);
    bytes.extend(lookup_list);
    bytes
}

/// `GDEF` table (version 1.2) of the full test font: glyph classes, an attachment point
/// for `A`, a caret for the `fi` ligature, and a mark glyph set with glyph 9.
fn gdef_table() -> Vec<u8> {
    let glyph_classes = words(&[2, 3, 1, 6, 1, 7, 7, 2, 8, 8, 1]);
    let attach_list = words(&[10, 1, 6, 1, 0, 1, 1, 1]);
    let ligature_caret_list = words(&[14, 1, 6, 1, 4, 1, 750, 1, 1, 7]);
    let mark_glyph_sets = words(&[1, 1, 0, 8, 1, 1, 9]);

    let attach_list_offset = 14 + len16(&glyph_classes);
    let ligature_caret_list_offset = attach_list_offset + len16(&attach_list);
    let mark_glyph_sets_offset = ligature_caret_list_offset + len16(&ligature_caret_list);
    let mut bytes = words(&[
        1,
        2,
        14,
        attach_list_offset,
        ligature_caret_list_offset,
        0, // markAttachClassDefOffset
        mark_glyph_sets_offset,
    ]);
    bytes.extend(glyph_classes);
    bytes.extend(attach_list);
    bytes.extend(ligature_caret_list);
    bytes.extend(mark_glyph_sets);
    bytes
}

fn os2_table(first_char: u16, last_char: u16) -> Vec<u8> {
    let mut bytes = vec![0; 96];
    let mut set = |offset: usize, value: u16| {
        bytes[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    };
    set(0, 4); // version
    set(2, 500); // xAvgCharWidth
    set(4, 400); // usWeightClass
    set(6, 5); // usWidthClass
    set(64, first_char);
    set(66, last_char);
    set(68, 800); // sTypoAscender
    set(70, 0xff38); // sTypoDescender = -200
    set(74, 900); // usWinAscent
    set(76, 250); // usWinDescent
    set(86, 500); // sxHeight
    set(88, 700); // sCapHeight
    set(92, 0x20); // usBreakChar
    set(94, 2); // usMaxContext
    bytes
}

/// `post` table header (without glyph names).
fn post_header(version: u32) -> Vec<u8> {
    let mut bytes = vec![];
    write_u32(&mut bytes, version);
    write_u32(&mut bytes, 0); // italicAngle
    bytes.extend_from_slice(&(-100_i16).to_be_bytes()); // underlinePosition
    write_u16(&mut bytes, 50); // underlineThickness
    write_u32(&mut bytes, 0); // isFixedPitch
    bytes.extend_from_slice(&[0; 16]); // memory usage
    bytes
}

/// `hhea` or `vhea` table; both have the same layout.
fn metrics_header(version: u32, ascender: i16, descender: i16, number_of_metrics: u16) -> Vec<u8> {
    let mut bytes = vec![];
    write_u32(&mut bytes, version);
    bytes.extend_from_slice(&ascender.to_be_bytes());
    bytes.extend_from_slice(&descender.to_be_bytes());
    bytes.extend_from_slice(&[0; 26]); // lineGap .. metricDataFormat
    write_u16(&mut bytes, number_of_metrics);
    bytes
}

#[derive(Debug, Clone)]
pub(crate) struct TestGlyph {
    raw: Vec<u8>,
    advance: u16,
}

impl TestGlyph {
    pub(crate) fn new(raw: Vec<u8>, advance: u16) -> Self {
        Self { raw, advance }
    }

    fn bbox_value(&self, idx: usize) -> Option<i16> {
        let start = 2 + 2 * idx;
        let bytes = self.raw.get(start..start + 2)?;
        Some(i16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

/// Builder for TrueType fonts with the required tables.
#[derive(Debug, Default)]
pub(crate) struct TestFontBuilder {
    glyphs: Vec<TestGlyph>,
    char_map: Vec<(char, u16)>,
    vertical: bool,
    extra_tables: Vec<(TableTag, Vec<u8>)>,
}

impl TestFontBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn glyph(mut self, glyph: TestGlyph) -> Self {
        self.glyphs.push(glyph);
        self
    }

    pub(crate) fn map(mut self, ch: char, glyph_idx: u16) -> Self {
        self.char_map.push((ch, glyph_idx));
        self
    }

    /// Adds `vhea` / `vmtx` tables.
    pub(crate) fn with_vertical_metrics(mut self) -> Self {
        self.vertical = true;
        self
    }

    /// Adds a table, or replaces a table generated by the builder.
    pub(crate) fn table(mut self, tag: TableTag, data: Vec<u8>) -> Self {
        self.extra_tables.push((tag, data));
        self
    }

    fn head_table(&self, loca_format: u16) -> Vec<u8> {
        let glyph_bboxes = self.glyphs.iter().filter(|glyph| !glyph.raw.is_empty());
        let mut bbox = [0_i16; 4];
        for glyph in glyph_bboxes {
            for (i, value) in bbox.iter_mut().enumerate() {
                let glyph_value = glyph.bbox_value(i).unwrap_or(0);
                *value = if i < 2 {
                    (*value).min(glyph_value)
                } else {
                    (*value).max(glyph_value)
                };
            }
        }

        let mut bytes = vec![];
        write_u32(&mut bytes, 0x_0001_0000); // version
        write_u32(&mut bytes, 0x_0001_0000); // fontRevision
        write_u32(&mut bytes, 0); // checksumAdjustment
        write_u32(&mut bytes, 0x_5f0f_3cf5); // magicNumber
        write_u16(&mut bytes, 0x_000b); // flags
        write_u16(&mut bytes, 1_000); // unitsPerEm
        bytes.extend_from_slice(&[0; 16]); // created, modified
        for value in bbox {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        write_u16(&mut bytes, 0); // macStyle
        write_u16(&mut bytes, 8); // lowestRecPPEM
        write_u16(&mut bytes, 2); // fontDirectionHint
        write_u16(&mut bytes, loca_format);
        write_u16(&mut bytes, 0); // glyphDataFormat
        bytes
    }

    fn maxp_table(&self) -> Vec<u8> {
        let mut bytes = vec![];
        write_u32(&mut bytes, 0x_0001_0000);
        write_u16(&mut bytes, u16::try_from(self.glyphs.len()).unwrap());
        for value in [64, 8, 64, 8, 2, 0, 0, 0, 0, 64, 16, 2, 1] {
            write_u16(&mut bytes, value);
        }
        bytes
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut glyf = vec![];
        let mut locations = vec![0];
        for glyph in &self.glyphs {
            glyf.extend_from_slice(&glyph.raw);
            if glyf.len() % 2 == 1 {
                glyf.push(0);
            }
            locations.push(glyf.len());
        }
        let mut loca = vec![];
        let loca_format = LocaTable::write(&locations, &mut loca).to_raw();

        let horizontal: Vec<_> = self
            .glyphs
            .iter()
            .map(|glyph| Metrics {
                advance: glyph.advance,
                side_bearing: u16::from_be_bytes(glyph.bbox_value(0).unwrap_or(0).to_be_bytes()),
            })
            .collect();
        let mut hmtx = vec![];
        let h_metrics_count = MetricsTable::write_for_glyphs(&horizontal, &mut hmtx);

        let mut char_map = self.char_map.clone();
        char_map.sort_unstable();
        let mut cmap = vec![];
        CmapTable::write_for_map(&char_map, &mut cmap);

        let mut container = FontContainer::new(FontContainer::TRUETYPE_VERSION);
        container.set_table(TableTag::HEAD, self.head_table(loca_format));
        container.set_table(
            TableTag::HHEA,
            metrics_header(0x_0001_0000, 800, -200, h_metrics_count),
        );
        container.set_table(TableTag::MAXP, self.maxp_table());
        container.set_table(TableTag::HMTX, hmtx);
        container.set_table(TableTag::CMAP, cmap);
        container.set_table(TableTag::LOCA, loca);
        container.set_table(TableTag::GLYF, glyf);
        container.set_table(TableTag::POST, post_header(0x_0003_0000));

        if self.vertical {
            let vertical: Vec<_> = (0_u16..)
                .zip(&self.glyphs)
                .map(|(i, _)| Metrics {
                    advance: 1_000,
                    side_bearing: 10 * i,
                })
                .collect();
            let mut vmtx = vec![];
            let v_metrics_count = MetricsTable::write_for_glyphs(&vertical, &mut vmtx);
            container.set_table(
                TableTag::VHEA,
                metrics_header(0x_0001_1000, 500, -500, v_metrics_count),
            );
            container.set_table(TableTag::VMTX, vmtx);
        }
        for (tag, data) in self.extra_tables {
            container.set_table(tag, data);
        }
        container.serialize()
    }
}

/// Synthetic font used in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TestFont {
    /// Font with all tables touched by subsetting.
    ///
    /// | Glyph | Char | Notes |
    /// |-------|------|-------|
    /// | 0 | | `.notdef` |
    /// | 1 | `A` | |
    /// | 2 | `B` | substituted with glyph 3 by `smcp` |
    /// | 3 | `C` | |
    /// | 4 | `f` | |
    /// | 5 | `Ä` | composite of glyphs 2 and 3 (scaled), with instructions |
    /// | 6 | `i` | |
    /// | 7 | | `fi` ligature |
    /// | 8 | `😀` | mapped via a format 12 `cmap` subtable |
    /// | 9 | ` ` | empty |
    Full,
    /// Font with the required tables only, a format 4 `cmap`, no layout tables and no vertical metrics.
    Minimal,
}

pub(crate) const TEST_FONTS: [TestFont; 2] = [TestFont::Full, TestFont::Minimal];

const NOTDEF: Contour<'static> = &[
    (50, 0, true),
    (50, 700, true),
    (450, 700, true),
    (450, 0, true),
];
const GLYPH_A: [Contour<'static>; 2] = [
    &[(0, 0, true), (250, 700, true), (500, 0, true)],
    &[(150, 200, true), (250, 450, false), (350, 200, true)],
];
const GLYPH_B: Contour<'static> = &[
    (60, 0, true),
    (60, 700, true),
    (300, 700, false),
    (420, 350, true),
    (300, 0, false),
];
const GLYPH_C: Contour<'static> = &[
    (500, 100, true),
    (250, -10, false),
    (20, 350, true),
    (250, 710, false),
    (500, 600, true),
];

/// `Ä` composed of glyph 2 and glyph 3 scaled by 0.25, with instructions.
fn accented_glyph() -> Vec<u8> {
    const ARGS_ARE_XY_VALUES: u16 = 0x0002;

    let mut bytes = words(&[0xffff, 0, 0, 500, 900]);
    let first_flags = GlyphComponent::ARG_1_AND_2_ARE_WORDS
        | ARGS_ARE_XY_VALUES
        | GlyphComponent::MORE_COMPONENTS;
    bytes.extend(words(&[first_flags, 2, 0, 0]));
    let second_flags = ARGS_ARE_XY_VALUES
        | GlyphComponent::WE_HAVE_A_SCALE
        | GlyphComponent::WE_HAVE_INSTRUCTIONS;
    bytes.extend(words(&[second_flags, 3]));
    bytes.extend_from_slice(&[100, 200]); // byte args
    bytes.extend(words(&[0x_4000]));
    bytes.extend_from_slice(&[0, 2, 0xb0, 0x00]);
    bytes
}

fn full_font() -> TestFontBuilder {
    let emoji: Contour<'_> = &[
        (0, 350, true),
        (0, 700, false),
        (350, 700, true),
        (700, 700, false),
        (700, 350, true),
        (700, 0, false),
        (350, 0, true),
        (0, 0, false),
    ];
    let glyph_i: [Contour<'_>; 2] = [
        &[(100, 0, true), (100, 500, true), (200, 500, true), (200, 0, true)],
        &[(100, 600, true), (100, 700, true), (200, 700, true), (200, 600, true)],
    ];
    let ligature: Contour<'_> = &[
        (0, 0, true),
        (0, 750, true),
        (1_500, 750, true),
        (1_500, 0, true),
    ];
    let glyph_f: Contour<'_> = &[
        (100, 0, true),
        (100, 600, true),
        (300, 750, false),
        (400, 700, true),
        (180, 0, true),
    ];

    TestFontBuilder::new()
        .glyph(TestGlyph::new(simple_glyph(&[NOTDEF], &[]), 500))
        .glyph(TestGlyph::new(simple_glyph(&GLYPH_A, &[0xb0, 0x01]), 520))
        .glyph(TestGlyph::new(simple_glyph(&[GLYPH_B], &[]), 480))
        .glyph(TestGlyph::new(simple_glyph(&[GLYPH_C], &[]), 510))
        .glyph(TestGlyph::new(simple_glyph(&[glyph_f], &[]), 300))
        .glyph(TestGlyph::new(accented_glyph(), 480))
        .glyph(TestGlyph::new(simple_glyph(&glyph_i, &[]), 250))
        .glyph(TestGlyph::new(simple_glyph(&[ligature], &[0xb0, 0x02]), 550))
        .glyph(TestGlyph::new(simple_glyph(&[emoji], &[]), 1_000))
        .glyph(TestGlyph::new(vec![], 250))
        .map('A', 1)
        .map('B', 2)
        .map('C', 3)
        .map('f', 4)
        .map('Ä', 5)
        .map('i', 6)
        .map('😀', 8)
        .map(' ', 9)
        .with_vertical_metrics()
        .table(TableTag::OS2, os2_table(0x20, 0xffff))
        .table(TableTag::CVT, words(&[10, 20, 0xffec]))
        .table(TableTag::FPGM, vec![0xb0, 0x00, 0x2c, 0x2d])
        .table(TableTag::PREP, vec![0xb0, 0x01, 0x1d])
        .table(TableTag::GASP, words(&[1, 1, 0xffff, 0x000f]))
        .table(TableTag::KERN, kern_table(&[(1, 2, -50), (1, 6, -10), (2, 3, -20)]))
        .table(TableTag::GSUB, gsub_table())
        .table(TableTag::GPOS, gpos_table())
        .table(TableTag::GDEF, gdef_table())
        .table(TableTag::POST, {
            // Version 2.0 with all glyphs using the `.notdef` standard name
            let mut post = post_header(0x_0002_0000);
            post.extend(words(&[10]));
            post.extend_from_slice(&[0; 2 * 10]);
            post
        })
        .table(
            TableTag::NAME,
            name_table(&[
                NameRecord::windows(1, "Test Sans"),
                NameRecord::windows(2, "Regular"),
                NameRecord::windows(4, "Test Sans Regular"),
            ]),
        )
}

fn minimal_font() -> TestFontBuilder {
    TestFontBuilder::new()
        .glyph(TestGlyph::new(simple_glyph(&[NOTDEF], &[]), 500))
        .glyph(TestGlyph::new(simple_glyph(&GLYPH_A, &[]), 520))
        .glyph(TestGlyph::new(simple_glyph(&[GLYPH_B], &[]), 480))
        .glyph(TestGlyph::new(simple_glyph(&[GLYPH_C], &[]), 510))
        .glyph(TestGlyph::new(
            composite_glyph(&[(2, 0, 0), (3, 100, 200)], false),
            480,
        ))
        .map('A', 1)
        .map('B', 2)
        .map('C', 3)
        .map('Ä', 4)
        .table(TableTag::NAME, name_table(&[NameRecord::mac(1, b"Minimal")]))
}

impl TestFont {
    pub(crate) fn builder(self) -> TestFontBuilder {
        match self {
            Self::Full => full_font(),
            Self::Minimal => minimal_font(),
        }
    }

    pub(crate) fn bytes(self) -> Vec<u8> {
        self.builder().build()
    }
}

#[derive(Debug, Clone)]
pub(crate) enum TestCharSubset {
    Range(ops::RangeInclusive<char>),
    Str(&'static str),
}

impl TestCharSubset {
    pub(crate) fn into_set(self) -> BTreeSet<char> {
        match self {
            Self::Range(range) => range.collect(),
            Self::Str(s) => s.chars().collect(),
        }
    }
}

pub(crate) const SUBSET_CHARS: [TestCharSubset; 5] = [
    TestCharSubset::Range(' '..='~'),
    TestCharSubset::Range('A'..='C'),
    TestCharSubset::Str("Ä"),
    TestCharSubset::Str("fi 😀"),
    TestCharSubset::Str("A"),
];

struct OpenTypeSanitizer {
    path: Option<String>,
}

impl fmt::Debug for OpenTypeSanitizer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OpenTypeSanitizer")
            .field("path", &self.path)
            .finish()
    }
}

impl Default for OpenTypeSanitizer {
    fn default() -> Self {
        let Ok(path) = env::var("OTS_SANITIZER") else {
            return Self { path: None };
        };
        let output = Command::new(&path)
            .arg("--version")
            .output()
            .unwrap_or_else(|err| {
                panic!("failed getting version for ots-sanitize at {path}: {err}");
            });
        assert!(
            output.status.success(),
            "failed getting version for ots-sanitize at {path}: non-zero exit code"
        );
        let version = String::from_utf8(output.stdout).unwrap_or_else(|err| {
            panic!("failed getting version for ots-sanitize at {path}: {err}");
        });
        println!("ots-sanitize version: {version}");
        Self { path: Some(path) }
    }
}

impl OpenTypeSanitizer {
    fn get() -> &'static Self {
        static SANITIZER: OnceLock<OpenTypeSanitizer> = OnceLock::new();
        SANITIZER.get_or_init(Self::default)
    }

    fn validate(&self, content: &[u8]) {
        let Some(path) = &self.path else {
            println!("OTS_SANITIZER env var is missing; skipping checks");
            return;
        };

        // Save content to the temporary file.
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.as_file_mut().write_all(content).unwrap();
        file.as_file_mut().flush().unwrap();
        let file_path = file.into_temp_path();

        let output = Command::new(path)
            .arg(&file_path)
            .output()
            .expect("failed running ots-sanitize");
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            panic!("ots-sanitize failed:\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}");
        }
    }
}

const OUTPUT_FORMATS: &[OutputFormat] = if cfg!(feature = "woff2") {
    &[OutputFormat::Ttf, OutputFormat::Woff, OutputFormat::Woff2]
} else {
    &[OutputFormat::Ttf, OutputFormat::Woff]
};

#[test_casing(10, Product((TEST_FONTS, SUBSET_CHARS)))]
fn subsetting_font(font: TestFont, chars: TestCharSubset) {
    let bytes = font.bytes();
    let container = FontContainer::parse(&bytes).unwrap();
    let original = Font::new(&container).unwrap();
    let chars = chars.into_set();
    let mapped_chars: Vec<_> = chars
        .iter()
        .copied()
        .filter(|&ch| original.map_char(ch).unwrap() != 0)
        .collect();

    let custom_chars: String = chars.iter().collect();
    let request = Request::new(&bytes)
        .with_custom_chars(&custom_chars)
        .with_formats(OUTPUT_FORMATS.iter().copied());
    let report = run(&request).unwrap();
    assert!(report.is_success());
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.subsetted, !mapped_chars.is_empty());
    assert_eq!(report.artifacts.len(), OUTPUT_FORMATS.len());

    for artifact in &report.artifacts {
        println!("Testing {} ({} bytes)", artifact.format, artifact.len());
        let is_ttf = artifact.format == OutputFormat::Ttf;
        assert_valid_font(&artifact.data, is_ttf, mapped_chars.iter().copied());
    }
}

#[test]
fn subsetting_reduces_font_size() {
    let bytes = TestFont::Full.bytes();
    let request = Request::new(&bytes)
        .with_custom_chars("A")
        .with_formats([OutputFormat::Ttf]);
    let report = run(&request).unwrap();
    let ttf = &report.artifacts[0];
    assert!(ttf.len() < bytes.len(), "{} >= {}", ttf.len(), bytes.len());

    let container = FontContainer::parse(&ttf.data).unwrap();
    // No substitutions, kerning pairs or positioning lookups involve the retained glyphs only.
    assert!(container.table(TableTag::GSUB).is_none());
    assert!(container.table(TableTag::KERN).is_none());
    assert!(container.table(TableTag::GPOS).is_none());
}

#[test_casing(2, TEST_FONTS)]
fn test_font_tables_are_well_formed(font: TestFont) {
    let bytes = font.bytes();
    let container = FontContainer::parse(&bytes).unwrap();
    assert_eq!(container.table(TableTag::HHEA).unwrap().len(), 36);
    if let Some(vhea) = container.table(TableTag::VHEA) {
        assert_eq!(vhea.len(), 36);
    }
    Font::new(&container).unwrap();

    let request = Request::new(&bytes)
        .with_custom_chars("AB")
        .with_formats([OutputFormat::Ttf]);
    let report = run(&request).unwrap();
    assert!(report.subsetted);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
}

fn assert_valid_font(raw: &[u8], is_ttf: bool, expected_chars: impl Iterator<Item = char>) {
    if is_ttf {
        let container = FontContainer::parse(raw).unwrap();
        Font::new(&container).unwrap();
    }

    let font_file = ReadScope::new(raw).read::<FontData>().unwrap();
    let font_provider = font_file.table_provider(0).unwrap();
    let mut font = allsorts::Font::new(font_provider).unwrap();
    for ch in expected_chars {
        let (glyph_id, _) = font.lookup_glyph_index(ch, MatchingPresentation::NotRequired, None);
        assert_ne!(glyph_id, 0, "{ch:?}");
    }

    OpenTypeSanitizer::get().validate(raw);
}
