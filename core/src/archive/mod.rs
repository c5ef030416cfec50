pub mod extract;

use crate::config::DEFAULT_MAX_ENTRY_BYTES;
use crate::error::{CoreError, CoreResult};
use crate::logging::LogContext;
use crate::outcome::{partition, Skip};
use crate::report::{human_bytes, ArchiveEntry, Category, Check, Status};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

pub use extract::{ext_of, is_text_asset, ExtractedEntry, TEXT_ASSET_EXTS};

pub struct ArchiveInspector {
    max_zip_bytes: u64,
    max_entry_bytes: u64,
}

/// Listing and on-disk tree of one decoded archive. Read-only once built.
#[derive(Debug, Clone)]
pub struct InspectedArchive {
    pub entries: Vec<ArchiveEntry>,
    pub extract_root: PathBuf,
    pub archive_bytes: u64,
    pub text_raw_bytes: u64,
    pub text_compressed_bytes: u64,
    pub text_files: usize,
    pub skipped: Vec<Skip>,
    pub checks: Vec<Check>,
    extracted: BTreeMap<String, PathBuf>,
    text_sources: BTreeMap<String, Vec<u8>>,
}

impl InspectedArchive {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.as_str())
    }

    pub fn has_root_index(&self) -> bool {
        self.names().any(|n| n == "index.html")
    }

    /// On-disk location of an extracted entry; `None` if it was skipped.
    pub fn local_path(&self, name: &str) -> Option<&Path> {
        self.extracted.get(name).map(|p| p.as_path())
    }

    /// Decompressed bytes of a text asset, whether or not it was written to disk.
    pub fn text_source(&self, name: &str) -> Option<&[u8]> {
        self.text_sources.get(name).map(|b| b.as_slice())
    }
}

impl ArchiveInspector {
    pub fn new(max_zip_bytes: u64) -> Self {
        Self {
            max_zip_bytes,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }

    pub fn with_entry_limit(mut self, max_entry_bytes: u64) -> Self {
        self.max_entry_bytes = max_entry_bytes;
        self
    }

    pub fn inspect(
        &self,
        bytes: &[u8],
        extract_root: &Path,
        ctx: &LogContext,
    ) -> CoreResult<InspectedArchive> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;

        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let f = zip
                .by_index_raw(i)
                .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
            entries.push(ArchiveEntry {
                name: f.name().to_string(),
                is_dir: f.is_dir(),
                size: f.size(),
                compressed: f.compressed_size(),
            });
        }

        std::fs::create_dir_all(extract_root)?;
        let outcomes: Vec<_> = (0..zip.len())
            .map(|i| extract::extract_entry(&mut zip, i, extract_root, self.max_entry_bytes))
            .collect();
        let (done, mut skipped) = partition(outcomes);

        let mut text_raw_bytes = 0u64;
        let mut text_compressed_bytes = 0u64;
        let mut extracted = BTreeMap::new();
        let mut text_sources = BTreeMap::new();
        for e in done {
            if let Some(text) = e.text {
                text_raw_bytes += text.len() as u64;
                text_compressed_bytes += extract::gzip_len(&text)?;
                text_sources.insert(e.name.clone(), text);
            }
            match e.path {
                Some(path) => {
                    extracted.insert(e.name, path);
                }
                None => skipped.push(Skip {
                    name: e.name,
                    reason: "entry path escapes extraction root".to_string(),
                }),
            }
        }
        for s in &skipped {
            log::warn!("{} ENTRY_SKIPPED name={:?} reason={:?}", ctx, s.name, s.reason);
        }
        let text_files = text_sources.len();

        let archive_bytes = bytes.len() as u64;
        let checks = vec![
            self.size_check(archive_bytes),
            text_compression_check(text_files, text_raw_bytes, text_compressed_bytes),
        ];

        log::info!(
            "{} ARCHIVE_EXTRACTED entries={} extracted={} skipped={} bytes={}",
            ctx,
            entries.len(),
            extracted.len(),
            skipped.len(),
            archive_bytes
        );

        Ok(InspectedArchive {
            entries,
            extract_root: extract_root.to_path_buf(),
            archive_bytes,
            text_raw_bytes,
            text_compressed_bytes,
            text_files,
            skipped,
            checks,
            extracted,
            text_sources,
        })
    }

    fn size_check(&self, archive_bytes: u64) -> Check {
        let status = if archive_bytes <= self.max_zip_bytes {
            Status::Green
        } else {
            Status::Red
        };
        Check::new(
            "compressed_file_size",
            Category::Archive,
            "Compressed File Size",
            status,
            &human_bytes(archive_bytes),
        )
        .with_help(format!("Limit {}", human_bytes(self.max_zip_bytes)))
    }
}

fn text_compression_check(files: usize, raw: u64, compressed: u64) -> Check {
    let id = "text_compressed_size";
    let label = "Text Compressed Size (gzip)";
    if files == 0 {
        return Check::new(id, Category::Archive, label, Status::Gray, "—")
            .with_help("No HTML/CSS/JS");
    }
    Check::new(
        id,
        Category::Archive,
        label,
        Status::Green,
        &human_bytes(compressed),
    )
    .with_help(format!("Raw {}", human_bytes(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in files {
            w.start_file(*name, SimpleFileOptions::default()).unwrap();
            w.write_all(body).unwrap();
        }
        w.finish().unwrap().into_inner()
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        let bytes = build_zip(&[("index.html", b"<html></html>")]);
        let n = bytes.len() as u64;
        let dir = tempfile::tempdir().unwrap();
        let ctx = LogContext::new("r_test");

        let at = ArchiveInspector::new(n)
            .inspect(&bytes, &dir.path().join("a"), &ctx)
            .unwrap();
        assert_eq!(at.checks[0].status, Status::Green);

        let below = ArchiveInspector::new(n - 1)
            .inspect(&bytes, &dir.path().join("b"), &ctx)
            .unwrap();
        assert_eq!(below.checks[0].status, Status::Red);
    }

    #[test]
    fn compression_check_is_gray_without_text_assets() {
        let bytes = build_zip(&[("fallback.png", b"\x89PNG"), ("data.json", b"{}")]);
        let dir = tempfile::tempdir().unwrap();
        let inspected = ArchiveInspector::new(1 << 20)
            .inspect(&bytes, dir.path(), &LogContext::new("r_test"))
            .unwrap();
        let c = &inspected.checks[1];
        assert_eq!(c.id, "text_compressed_size");
        assert_eq!(c.status, Status::Gray);
        assert_eq!(c.value, "—");
    }

    #[test]
    fn unparseable_bytes_are_invalid_archive() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveInspector::new(1024)
            .inspect(b"definitely not a zip", dir.path(), &LogContext::new("r_test"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArchive(_)));
        assert!(err.to_string().starts_with("Invalid ZIP:"));
    }

    #[test]
    fn escaping_entries_are_listed_but_not_written() {
        let bytes = build_zip(&[("index.html", b"<p>hi</p>"), ("../evil.js", b"x=1")]);
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("unzipped");
        let inspected = ArchiveInspector::new(1 << 20)
            .inspect(&bytes, &root, &LogContext::new("r_test"))
            .unwrap();
        assert_eq!(inspected.entries.len(), 2);
        assert_eq!(inspected.skipped.len(), 1);
        assert_eq!(inspected.skipped[0].name, "../evil.js");
        assert!(inspected.local_path("../evil.js").is_none());
        assert!(!dir.path().join("evil.js").exists());
        assert!(inspected.local_path("index.html").unwrap().is_file());

        // Still read for the text scan and the gzip totals.
        assert_eq!(inspected.text_source("../evil.js"), Some(&b"x=1"[..]));
        assert_eq!(inspected.text_files, 2);
        assert_eq!(inspected.text_raw_bytes, 12);
    }

    #[test]
    fn oversized_entries_are_skipped_not_fatal() {
        let big = vec![b' '; 4096];
        let bytes = build_zip(&[("index.html", b"<p>hi</p>"), ("bundle.js", &big)]);
        let dir = tempfile::tempdir().unwrap();
        let inspected = ArchiveInspector::new(1 << 20)
            .with_entry_limit(1024)
            .inspect(&bytes, dir.path(), &LogContext::new("r_test"))
            .unwrap();
        assert_eq!(inspected.entries.len(), 2);
        assert_eq!(inspected.entries[1].size, 4096);
        assert_eq!(inspected.skipped.len(), 1);
        assert_eq!(inspected.skipped[0].name, "bundle.js");
        assert!(inspected.skipped[0].reason.contains("exceeds 1024 bytes"));
        assert!(inspected.text_source("bundle.js").is_none());
        assert_eq!(inspected.text_files, 1);
    }
}
