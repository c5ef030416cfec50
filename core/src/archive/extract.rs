use crate::error::{CoreError, CoreResult};
use crate::outcome::EntryOutcome;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

pub const TEXT_ASSET_EXTS: [&str; 4] = [".html", ".htm", ".css", ".js"];

#[derive(Debug, Clone)]
pub struct ExtractedEntry {
    pub name: String,
    /// `None` when the name would escape the extraction root; nothing is written.
    pub path: Option<PathBuf>,
    /// Decompressed bytes, kept for text assets only.
    pub text: Option<Vec<u8>>,
}

/// Lowercased extension with a leading dot; `None` for directories and bare names.
pub fn ext_of(name: &str) -> Option<String> {
    if name.ends_with('/') {
        return None;
    }
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
}

pub fn is_text_asset(name: &str) -> bool {
    ext_of(name)
        .map(|e| TEXT_ASSET_EXTS.contains(&e.as_str()))
        .unwrap_or(false)
}

/// Reads entry `index` and writes it below `root`. Entries that fail to
/// decompress or exceed `max_bytes` are skipped; entries whose names would
/// escape `root` are read but not written.
pub fn extract_entry<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    index: usize,
    root: &Path,
    max_bytes: u64,
) -> EntryOutcome<ExtractedEntry> {
    let name = zip.name_for_index(index).unwrap_or_default().to_string();
    EntryOutcome::from_result(&name, extract_entry_inner(zip, index, root, max_bytes))
}

fn extract_entry_inner<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    index: usize,
    root: &Path,
    max_bytes: u64,
) -> CoreResult<ExtractedEntry> {
    let mut f = zip
        .by_index(index)
        .map_err(|e| CoreError::DecodeFailure(e.to_string()))?;
    let name = f.name().to_string();
    let path = f.enclosed_name().map(|rel| root.join(rel));

    if f.is_dir() {
        if let Some(p) = &path {
            fs::create_dir_all(p)?;
        }
        return Ok(ExtractedEntry {
            name,
            path,
            text: None,
        });
    }

    let buf = read_capped(&mut f, max_bytes)?;
    if let Some(p) = &path {
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(p, &buf)?;
    }

    let text = is_text_asset(&name).then_some(buf);
    Ok(ExtractedEntry { name, path, text })
}

/// The declared size in the header is not trusted; at most `max_bytes` are read.
fn read_capped<R: Read>(r: &mut R, max_bytes: u64) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    r.take(max_bytes.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| CoreError::DecodeFailure(e.to_string()))?;
    if buf.len() as u64 > max_bytes {
        return Err(CoreError::DecodeFailure(format!(
            "entry exceeds {} bytes",
            max_bytes
        )));
    }
    Ok(buf)
}

pub fn gzip_len(buf: &[u8]) -> CoreResult<u64> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::best());
    enc.write_all(buf)?;
    Ok(enc.finish()?.len() as u64)
}
