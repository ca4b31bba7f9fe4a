use crate::error::AppError;
use img_parts::png::{Png, PngChunk};
use img_parts::Bytes;
use std::fs;
use std::path::Path;

const CHUNK_TEXT: [u8; 4] = *b"tEXt";
const CHUNK_ITXT: [u8; 4] = *b"iTXt";
const CHUNK_ZTXT: [u8; 4] = *b"zTXt";
const CHUNK_IDAT: [u8; 4] = *b"IDAT";
const CHUNK_IEND: [u8; 4] = *b"IEND";

pub const DESCRIPTION_KEYS: [&str; 2] = ["Description", "ImageDescription"];

fn is_text_chunk(kind: [u8; 4]) -> bool {
    kind == CHUNK_TEXT || kind == CHUNK_ITXT || kind == CHUNK_ZTXT
}

fn keyword(contents: &[u8]) -> &[u8] {
    match contents.iter().position(|&b| b == 0) {
        Some(end) => &contents[..end],
        None => contents,
    }
}

fn is_description_chunk(chunk: &PngChunk) -> bool {
    is_text_chunk(chunk.kind())
        && DESCRIPTION_KEYS
            .iter()
            .any(|key| keyword(chunk.contents()) == key.as_bytes())
}

/// Builds an uncompressed iTXt payload with no language tag.
fn itxt_contents(key: &str, text: &str) -> Bytes {
    let mut contents = Vec::with_capacity(key.len() + text.len() + 5);
    contents.extend_from_slice(key.as_bytes());
    contents.push(0); // keyword terminator
    contents.push(0); // compression flag
    contents.push(0); // compression method
    contents.push(0); // empty language tag
    contents.push(0); // empty translated keyword
    contents.extend_from_slice(text.as_bytes());
    Bytes::from(contents)
}

/// Decodes a tEXt or uncompressed iTXt chunk. zTXt and compressed iTXt are skipped.
fn decode_text(chunk: &PngChunk) -> Option<(String, String)> {
    let contents = chunk.contents();
    let key = keyword(contents);
    let rest = contents.get(key.len() + 1..)?;
    let key: String = key.iter().map(|&b| b as char).collect();

    match chunk.kind() {
        CHUNK_TEXT => {
            // tEXt is Latin-1
            let text = rest.iter().map(|&b| b as char).collect();
            Some((key, text))
        }
        CHUNK_ITXT => {
            let (&compressed, rest) = rest.split_first()?;
            if compressed != 0 {
                log::debug!("Skipping compressed iTXt entry '{}'", key);
                return None;
            }
            let rest = rest.get(1..)?;
            let language_end = rest.iter().position(|&b| b == 0)?;
            let rest = &rest[language_end + 1..];
            let translated_end = rest.iter().position(|&b| b == 0)?;
            let text = String::from_utf8_lossy(&rest[translated_end + 1..]).into_owned();
            Some((key, text))
        }
        _ => {
            log::debug!("Skipping compressed zTXt entry '{}'", key);
            None
        }
    }
}

fn load(path: &Path) -> Result<Png, AppError> {
    let bytes = fs::read(path)?;
    Ok(Png::from_bytes(Bytes::from(bytes))?)
}

/// All readable text entries, in file order.
pub fn text_entries(path: &Path) -> Result<Vec<(String, String)>, AppError> {
    let png = load(path)?;
    Ok(png
        .chunks()
        .iter()
        .filter(|chunk| is_text_chunk(chunk.kind()))
        .filter_map(decode_text)
        .collect())
}

pub fn read_description(path: &Path) -> Result<Option<String>, AppError> {
    let entries = text_entries(path)?;
    for key in DESCRIPTION_KEYS {
        if let Some((_, text)) = entries.iter().find(|(k, _)| k == key) {
            return Ok(Some(text.clone()));
        }
    }
    Ok(None)
}

/// Replaces the description entries, leaving every other chunk untouched.
pub fn write(path: &Path, description: &str) -> Result<(), AppError> {
    let mut png = load(path)?;
    let chunks = png.chunks_mut();
    chunks.retain(|chunk| !is_description_chunk(chunk));

    // Before the first IDAT so decoders that stop at image data still see them.
    let index = chunks
        .iter()
        .position(|chunk| chunk.kind() == CHUNK_IDAT || chunk.kind() == CHUNK_IEND)
        .ok_or_else(|| AppError::Generic(format!("{} has no image data", path.display())))?;
    for key in DESCRIPTION_KEYS.iter().rev() {
        chunks.insert(index, PngChunk::new(CHUNK_ITXT, itxt_contents(key, description)));
    }

    let mut out = Vec::new();
    png.encoder().write_to(&mut out)?;
    fs::write(path, out)?;
    Ok(())
}
