use crate::error::AppError;
use exif::experimental::Writer;
use exif::{Exif, Field, In, Reader, Tag, Value};
use img_parts::jpeg::Jpeg;
use img_parts::riff::{RiffChunk, RiffContent};
use img_parts::webp::WebP;
use img_parts::{Bytes, ImageEXIF};
use std::fs;
use std::io::Cursor;
use std::path::Path;

const CHUNK_VP8X: [u8; 4] = *b"VP8X";
const CHUNK_VP8L: [u8; 4] = *b"VP8L";
const CHUNK_ALPH: [u8; 4] = *b"ALPH";
const CHUNK_EXIF: [u8; 4] = *b"EXIF";
const CHUNK_XMP: [u8; 4] = *b"XMP ";

const VP8X_FLAG_ALPHA: u8 = 0x10;
const VP8X_FLAG_EXIF: u8 = 0x08;

// Offsets and image-data locations are regenerated by the writer.
const REGENERATED_TAGS: [Tag; 10] = [
    Tag::ImageDescription,
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
    Tag::StripOffsets,
    Tag::StripByteCounts,
    Tag::TileOffsets,
    Tag::TileByteCounts,
    Tag::JPEGInterchangeFormat,
    Tag::JPEGInterchangeFormatLength,
];

fn load_exif(bytes: &[u8]) -> Result<Option<Exif>, AppError> {
    match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => Ok(Some(exif)),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn carries_forward(field: &Field) -> bool {
    field.ifd_num == In::PRIMARY
        && !REGENERATED_TAGS.contains(&field.tag)
        && !matches!(field.value, Value::Unknown(..))
}

/// Serialises a TIFF block holding the primary fields of `existing` plus the new description.
fn build_exif(existing: Option<&Exif>, description: &str) -> Result<Vec<u8>, AppError> {
    let description_field = Field {
        tag: Tag::ImageDescription,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![description.as_bytes().to_vec()]),
    };

    let mut writer = Writer::new();
    if let Some(exif) = existing {
        for field in exif.fields().filter(|f| carries_forward(f)) {
            log::trace!("Carrying forward EXIF field {}", field.tag);
            writer.push_field(field);
        }
    }
    writer.push_field(&description_field);

    let little_endian = existing.map(|e| e.little_endian()).unwrap_or(false);
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, little_endian)?;
    Ok(buf.into_inner())
}

fn field_text(field: &Field, little_endian: bool) -> Option<String> {
    match &field.value {
        Value::Ascii(parts) => {
            let text: Vec<String> = parts
                .iter()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .collect();
            Some(text.join(""))
        }
        Value::Undefined(bytes, _) => Some(decode_user_comment(bytes, little_endian)),
        _ => None,
    }
}

const CODE_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const CODE_UNICODE: &[u8; 8] = b"UNICODE\0";
const CODE_JIS: &[u8; 8] = b"JIS\0\0\0\0\0";
const CODE_UNDEFINED: &[u8; 8] = &[0; 8];

/// Decodes a UserComment. The 8-byte character code is only stripped when it
/// is one of the codes EXIF defines; UNICODE bodies are UCS-2 in TIFF byte order.
fn decode_user_comment(bytes: &[u8], little_endian: bool) -> String {
    let (code, body) = match bytes.get(..8) {
        Some(code)
            if [CODE_ASCII, CODE_UNICODE, CODE_JIS, CODE_UNDEFINED]
                .iter()
                .any(|known| code == &known[..]) =>
        {
            (code, &bytes[8..])
        }
        _ => (&bytes[..0], bytes),
    };

    let text = if code == &CODE_UNICODE[..] {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| {
                if little_endian {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(body).into_owned()
    };
    text.trim_end_matches('\0').trim().to_string()
}

fn read_tag(path: &Path, tag: Tag) -> Result<Option<String>, AppError> {
    let bytes = fs::read(path)?;
    let exif = match load_exif(&bytes)? {
        Some(exif) => exif,
        None => return Ok(None),
    };
    let little_endian = exif.little_endian();
    Ok(exif
        .get_field(tag, In::PRIMARY)
        .and_then(|field| field_text(field, little_endian))
        .filter(|text| !text.is_empty()))
}

pub fn read_description(path: &Path) -> Result<Option<String>, AppError> {
    read_tag(path, Tag::ImageDescription)
}

pub fn read_user_comment(path: &Path) -> Result<Option<String>, AppError> {
    read_tag(path, Tag::UserComment)
}

pub fn write_jpeg(path: &Path, description: &str) -> Result<(), AppError> {
    let bytes = fs::read(path)?;
    let existing = load_exif(&bytes)?;
    let tiff = build_exif(existing.as_ref(), description)?;

    let mut jpeg = Jpeg::from_bytes(Bytes::from(bytes))?;
    jpeg.set_exif(Some(Bytes::from(tiff)));

    let mut out = Vec::new();
    jpeg.encoder().write_to(&mut out)?;
    fs::write(path, out)?;
    Ok(())
}

pub fn write_webp(path: &Path, description: &str) -> Result<(), AppError> {
    let bytes = fs::read(path)?;
    let existing = load_exif(&bytes)?;
    let tiff = build_exif(existing.as_ref(), description)?;
    let (width, height) = image::image_dimensions(path)?;

    let mut webp = WebP::from_bytes(Bytes::from(bytes))?;
    let chunks = webp.chunks_mut();
    chunks.retain(|chunk| chunk.id() != CHUNK_EXIF);

    // EXIF goes after the image data and before any XMP chunk.
    let exif_chunk = RiffChunk::new(CHUNK_EXIF, RiffContent::Data(Bytes::from(tiff)));
    match chunks.iter().position(|chunk| chunk.id() == CHUNK_XMP) {
        Some(index) => chunks.insert(index, exif_chunk),
        None => chunks.push(exif_chunk),
    }
    mark_extended(chunks, width, height);

    let mut out = Vec::new();
    webp.encoder().write_to(&mut out)?;
    fs::write(path, out)?;
    Ok(())
}

/// Sets the EXIF flag on the VP8X header, creating one for simple-format files.
fn mark_extended(chunks: &mut Vec<RiffChunk>, width: u32, height: u32) {
    if let Some(index) = chunks.iter().position(|chunk| chunk.id() == CHUNK_VP8X) {
        let header = match chunks[index].content() {
            RiffContent::Data(data) => Some(data.to_vec()),
            _ => None,
        };
        if let Some(mut header) = header {
            if let Some(flags) = header.first_mut() {
                *flags |= VP8X_FLAG_EXIF;
            }
            chunks[index] = RiffChunk::new(CHUNK_VP8X, RiffContent::Data(Bytes::from(header)));
        }
        return;
    }

    let mut flags = VP8X_FLAG_EXIF;
    if has_alpha(chunks) {
        flags |= VP8X_FLAG_ALPHA;
    }
    chunks.insert(0, RiffChunk::new(CHUNK_VP8X, RiffContent::Data(vp8x_header(flags, width, height))));
}

fn vp8x_header(flags: u8, width: u32, height: u32) -> Bytes {
    let mut header = Vec::with_capacity(10);
    header.push(flags);
    header.extend_from_slice(&[0, 0, 0]);
    header.extend_from_slice(&width.saturating_sub(1).to_le_bytes()[..3]);
    header.extend_from_slice(&height.saturating_sub(1).to_le_bytes()[..3]);
    Bytes::from(header)
}

// Lossy files carry alpha in an ALPH chunk; lossless ones flag it in the VP8L header.
fn has_alpha(chunks: &[RiffChunk]) -> bool {
    chunks.iter().any(|chunk| match (chunk.id(), chunk.content()) {
        (CHUNK_ALPH, _) => true,
        (CHUNK_VP8L, RiffContent::Data(data)) if data.len() >= 5 => {
            let bits = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
            bits & (1 << 28) != 0
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::fixtures;

    fn jpeg_with_camera_fields(dir: &Path) -> std::path::PathBuf {
        let path = fixtures::image(dir, "camera.jpg");
        let make = Field {
            tag: Tag::Make,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![b"Acme".to_vec()]),
        };
        let taken = Field {
            tag: Tag::DateTimeOriginal,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![b"2023:05:01 10:00:00".to_vec()]),
        };
        let mut writer = Writer::new();
        writer.push_field(&make);
        writer.push_field(&taken);
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();

        let mut jpeg = Jpeg::from_bytes(Bytes::from(fs::read(&path).unwrap())).unwrap();
        jpeg.set_exif(Some(Bytes::from(buf.into_inner())));
        let mut out = Vec::new();
        jpeg.encoder().write_to(&mut out).unwrap();
        fs::write(&path, out).unwrap();
        path
    }

    #[test]
    fn existing_fields_survive_a_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = jpeg_with_camera_fields(dir.path());

        write_jpeg(&path, "A red car").unwrap();

        let exif = load_exif(&fs::read(&path).unwrap()).unwrap().unwrap();
        let make = exif
            .get_field(Tag::Make, In::PRIMARY)
            .and_then(|f| field_text(f, false));
        let taken = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .and_then(|f| field_text(f, false));
        assert_eq!(make.as_deref(), Some("Acme"));
        assert_eq!(taken.as_deref(), Some("2023:05:01 10:00:00"));
        assert_eq!(read_description(&path).unwrap().as_deref(), Some("A red car"));
    }

    #[test]
    fn rewrite_keeps_a_single_description_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::image(dir.path(), "photo.jpg");
        write_jpeg(&path, "one").unwrap();
        write_jpeg(&path, "two").unwrap();

        let exif = load_exif(&fs::read(&path).unwrap()).unwrap().unwrap();
        let count = exif
            .fields()
            .filter(|f| f.tag == Tag::ImageDescription)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn jpeg_pixels_still_decode_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::image(dir.path(), "photo.jpg");
        write_jpeg(&path, "still an image").unwrap();
        assert_eq!(image::image_dimensions(&path).unwrap(), (8, 6));
    }

    #[test]
    fn utf8_descriptions_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::image(dir.path(), "café.webp");
        write_webp(&path, "Crème brûlée on a blue plate").unwrap();
        assert_eq!(
            read_description(&path).unwrap().as_deref(),
            Some("Crème brûlée on a blue plate")
        );
    }

    #[test]
    fn webp_gains_an_extended_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::image(dir.path(), "photo.webp");
        write_webp(&path, "A magenta square").unwrap();

        let webp = WebP::from_bytes(Bytes::from(fs::read(&path).unwrap())).unwrap();
        let first = &webp.chunks()[0];
        assert_eq!(first.id(), CHUNK_VP8X);
        match first.content() {
            RiffContent::Data(data) => {
                assert_eq!(data.len(), 10);
                assert_ne!(data[0] & VP8X_FLAG_EXIF, 0);
                assert_eq!(data[4], 7);
                assert_eq!(data[7], 5);
            }
            _ => panic!("VP8X must carry data"),
        }
        assert_eq!(webp.chunks().iter().filter(|c| c.id() == CHUNK_EXIF).count(), 1);
        assert_eq!(image::image_dimensions(&path).unwrap(), (8, 6));
    }

    #[test]
    fn user_comment_strips_character_code() {
        assert_eq!(
            decode_user_comment(b"ASCII\0\0\0Shot at dusk\0", false),
            "Shot at dusk"
        );
        assert_eq!(decode_user_comment(b"short", false), "short");
    }

    #[test]
    fn user_comment_without_character_code_is_kept_whole() {
        assert_eq!(
            decode_user_comment(b"Shot at dusk by the lake", false),
            "Shot at dusk by the lake"
        );
        assert_eq!(
            decode_user_comment(b"\0\0\0\0\0\0\0\0Tripod, 30s", false),
            "Tripod, 30s"
        );
    }

    #[test]
    fn unicode_user_comment_follows_byte_order() {
        let mut big = CODE_UNICODE.to_vec();
        big.extend_from_slice(&[0x00, b'H', 0x00, 0xe9]);
        assert_eq!(decode_user_comment(&big, false), "H\u{e9}");

        let mut little = CODE_UNICODE.to_vec();
        little.extend_from_slice(&[b'H', 0x00, 0xe9, 0x00]);
        assert_eq!(decode_user_comment(&little, true), "H\u{e9}");
    }

    #[test]
    fn vp8x_header_encodes_canvas_minus_one() {
        let header = vp8x_header(VP8X_FLAG_EXIF, 640, 480);
        assert_eq!(&header[..], &[0x08, 0, 0, 0, 0x7f, 0x02, 0, 0xdf, 0x01, 0]);
    }
}
