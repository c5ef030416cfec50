use crate::archive::{ext_of, InspectedArchive};
use crate::outcome::{partition, EntryOutcome, Skip};

const CORPUS_EXTS: [&str; 3] = [".html", ".htm", ".js"];

/// Decoded HTML/JS sources of one archive, in archive order.
#[derive(Debug, Clone, Default)]
pub struct TextCorpus {
    pub documents: Vec<(String, String)>,
    pub skipped: Vec<Skip>,
}

impl TextCorpus {
    pub fn collect(archive: &InspectedArchive) -> Self {
        let outcomes = archive
            .file_names()
            .filter(|n| {
                ext_of(n)
                    .map(|e| CORPUS_EXTS.contains(&e.as_str()))
                    .unwrap_or(false)
            })
            .map(|n| read_document(archive, n));
        let (documents, skipped) = partition(outcomes);
        Self { documents, skipped }
    }

    /// All documents joined with newlines.
    pub fn joined(&self) -> String {
        self.documents
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// Escaping entries are read from the archive, not the extracted tree, so
// they are still scanned.
fn read_document(archive: &InspectedArchive, name: &str) -> EntryOutcome<(String, String)> {
    match archive.text_source(name) {
        Some(bytes) => EntryOutcome::Done((name.to_string(), decode_dropping_invalid(bytes))),
        None => EntryOutcome::skipped(name, "not decompressed"),
    }
}

/// UTF-8 decode that drops invalid sequences instead of failing or substituting.
pub fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::decode_dropping_invalid;

    #[test]
    fn invalid_sequences_are_dropped() {
        assert_eq!(decode_dropping_invalid(b"click\xffTag\xc3"), "clickTag");
        assert_eq!(decode_dropping_invalid("caf\u{e9}".as_bytes()), "caf\u{e9}");
    }
}
