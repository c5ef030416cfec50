pub mod corpus;
pub mod minify;

use crate::archive::{ext_of, InspectedArchive};
use crate::config::ValidatorConfig;
use crate::error::{CoreError, CoreResult};
use crate::logging::LogContext;
use crate::outcome::Skip;
use crate::report::{Category, Check, Status};
use corpus::{decode_dropping_invalid, TextCorpus};
use minify::{looks_minified, MinifyThresholds};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

const MAX_LISTED: usize = 8;
const MAX_LISTED_URLS: usize = 2;

/// Static, filename and text based policy checks. Never fails a run.
pub struct PolicyScanner {
    require_root_index: bool,
    allow_ext: BTreeSet<String>,
    deny_ext: BTreeSet<String>,
    junk_prefixes: Vec<String>,
    junk_files: BTreeSet<String>,
    allow_remote_urls: bool,
    minify: MinifyThresholds,
    click_res: Vec<Regex>,
    http_re: Regex,
    cookie_re: Regex,
    doc_write_re: Regex,
    backup_re: Regex,
}

/// Hygiene checks (Archive category) are kept apart so the image check can be
/// placed between them and the content checks.
#[derive(Debug, Clone, Default)]
pub struct PolicyFindings {
    pub hygiene: Vec<Check>,
    pub content: Vec<Check>,
    pub skipped: Vec<Skip>,
}

impl PolicyScanner {
    pub fn new(cfg: &ValidatorConfig) -> CoreResult<Self> {
        Ok(Self {
            require_root_index: cfg.require_root_index,
            allow_ext: cfg.allow_ext.clone(),
            deny_ext: cfg.deny_ext.clone(),
            junk_prefixes: cfg.junk_prefixes.clone(),
            junk_files: cfg.junk_files.iter().cloned().collect(),
            allow_remote_urls: cfg.allow_remote_urls,
            minify: cfg.minify,
            click_res: cfg.compile_click_patterns()?,
            http_re: case_insensitive(r#"https?://[^\s'"()<>]+"#)?,
            cookie_re: compile(r"document\.cookie\s*=")?,
            doc_write_re: case_insensitive(r"document\.write\s*\(")?,
            backup_re: case_insensitive(r"(?:^|/)(?:backup|fallback)\.(?:jpg|jpeg|png|gif)$")?,
        })
    }

    pub fn scan(&self, archive: &InspectedArchive, ctx: &LogContext) -> PolicyFindings {
        let names: Vec<&str> = archive.names().collect();
        let corpus = TextCorpus::collect(archive);
        let all_text = corpus.joined();

        let (denied, unlisted) = self.check_extensions(&names);
        let hygiene = vec![
            self.check_junk(&names),
            self.check_root_index(archive.has_root_index()),
            denied,
            unlisted,
        ];

        let content = vec![
            self.check_backup(&names),
            self.check_click_through(&all_text),
            self.check_external_urls(&all_text),
            self.check_cookies(&all_text),
            self.check_document_write(&all_text),
            check_css_embedded(&corpus),
            self.check_minified(&archive.extract_root),
        ];

        for s in &corpus.skipped {
            log::warn!("{} TEXT_SKIPPED name={:?} reason={:?}", ctx, s.name, s.reason);
        }
        log::debug!(
            "{} POLICY_SCANNED documents={} text_chars={}",
            ctx,
            corpus.documents.len(),
            all_text.len()
        );

        PolicyFindings {
            hygiene,
            content,
            skipped: corpus.skipped,
        }
    }

    pub fn check_junk(&self, names: &[&str]) -> Check {
        let found: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| {
                self.junk_prefixes.iter().any(|p| n.starts_with(p.as_str()))
                    || self.junk_files.contains(basename(n))
            })
            .collect();
        let (status, value) = if found.is_empty() {
            (Status::Green, "No")
        } else {
            (Status::Red, "Yes")
        };
        Check::new("junk_files", Category::Archive, "Junk Files", status, value)
            .with_help(list_head(&found, MAX_LISTED, ", "))
    }

    pub fn check_root_index(&self, has_root_index: bool) -> Check {
        let status = if has_root_index || !self.require_root_index {
            Status::Green
        } else {
            Status::Red
        };
        Check::new(
            "index_html",
            Category::Archive,
            "Root index.html",
            status,
            if has_root_index { "Yes" } else { "No" },
        )
    }

    /// Returns the deny-list check and the unlisted-extension check.
    pub fn check_extensions(&self, names: &[&str]) -> (Check, Check) {
        let mut denied = Vec::new();
        let mut unlisted = Vec::new();
        for n in names {
            let Some(ext) = ext_of(n) else { continue };
            if self.deny_ext.contains(&ext) {
                denied.push(*n);
            } else if !self.allow_ext.contains(&ext) {
                unlisted.push(*n);
            }
        }

        let denied_check = if denied.is_empty() {
            Check::new("denied_ext", Category::Archive, "Blocked File Types", Status::Green, "None")
        } else {
            Check::new("denied_ext", Category::Archive, "Blocked File Types", Status::Red, "Present")
                .with_help(list_head(&denied, MAX_LISTED, ", "))
        };
        let unlisted_status = if unlisted.is_empty() {
            Status::Green
        } else {
            Status::Yellow
        };
        let unlisted_check = Check::new(
            "unlisted_ext",
            Category::Archive,
            "Unlisted Extensions",
            unlisted_status,
            &unlisted.len().to_string(),
        )
        .with_help(list_head(&unlisted, MAX_LISTED, ", "));

        (denied_check, unlisted_check)
    }

    pub fn check_backup(&self, names: &[&str]) -> Check {
        let found = names.iter().any(|n| self.backup_re.is_match(n));
        let (status, value) = if found {
            (Status::Green, "Yes")
        } else {
            (Status::Red, "No")
        };
        Check::new("has_backup_ad", Category::Policy, "Backup Ad", status, value)
    }

    pub fn check_click_through(&self, text: &str) -> Check {
        let found = self.click_res.iter().any(|re| re.is_match(text));
        let (status, value) = if found {
            (Status::Green, "clickTag/Enabler")
        } else {
            (Status::Red, "None")
        };
        Check::new("click_through", Category::Policy, "Click Through", status, value)
    }

    pub fn check_external_urls(&self, text: &str) -> Check {
        let id = "external_urls";
        let label = "External URLs";
        if self.allow_remote_urls {
            return Check::new(id, Category::Network, label, Status::Gray, "—")
                .with_help("Remote URLs allowed");
        }
        let urls: BTreeSet<&str> = self.http_re.find_iter(text).map(|m| m.as_str()).collect();
        if urls.is_empty() {
            return Check::new(id, Category::Network, label, Status::Green, "0");
        }
        let urls: Vec<&str> = urls.into_iter().collect();
        Check::new(id, Category::Network, label, Status::Red, &urls.len().to_string())
            .with_help(list_head(&urls, MAX_LISTED_URLS, " "))
    }

    pub fn check_cookies(&self, text: &str) -> Check {
        let (status, value) = if self.cookie_re.is_match(text) {
            (Status::Red, "Yes")
        } else {
            (Status::Green, "0")
        };
        Check::new("cookies_dropped", Category::Policy, "Cookies Dropped", status, value)
    }

    pub fn check_document_write(&self, text: &str) -> Check {
        let (status, value) = if self.doc_write_re.is_match(text) {
            (Status::Red, "Yes")
        } else {
            (Status::Green, "No")
        };
        Check::new(
            "document_write",
            Category::Policy,
            "Uses document.write()",
            status,
            value,
        )
    }

    /// Looks at every `.css`/`.js` file under the extracted tree.
    pub fn check_minified(&self, extract_root: &Path) -> Check {
        let mut min_css = false;
        let mut min_js = false;
        let walker = WalkDir::new(extract_root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file());
        for e in walker {
            let name = e.file_name().to_string_lossy();
            let ext = ext_of(&name);
            let is_css = ext.as_deref() == Some(".css");
            let is_js = ext.as_deref() == Some(".js");
            if !(is_css || is_js) || (is_css && min_css) || (is_js && min_js) {
                continue;
            }
            let Ok(bytes) = std::fs::read(e.path()) else {
                continue;
            };
            if looks_minified(&decode_dropping_invalid(&bytes), &self.minify) {
                if is_css {
                    min_css = true;
                } else {
                    min_js = true;
                }
            }
        }

        let mut kinds = Vec::new();
        if min_css {
            kinds.push("CSS");
        }
        if min_js {
            kinds.push("JS");
        }
        let (status, value) = if kinds.is_empty() {
            (Status::Yellow, "No".to_string())
        } else {
            (Status::Green, kinds.join(", "))
        };
        Check::new(
            "minified_css_js",
            Category::Policy,
            "CSS/JS Minified",
            status,
            &value,
        )
    }
}

fn check_css_embedded(corpus: &TextCorpus) -> Check {
    let found = corpus.documents.iter().any(|(_, t)| {
        let t = t.to_lowercase();
        t.contains("<style") || t.contains(" style=")
    });
    let (status, value) = if found {
        (Status::Green, "Yes")
    } else {
        (Status::Yellow, "No")
    };
    Check::new("css_embedded", Category::Policy, "CSS Embedded", status, value)
}

fn basename(name: &str) -> &str {
    name.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(name)
}

fn list_head(items: &[&str], n: usize, sep: &str) -> String {
    items.iter().take(n).copied().collect::<Vec<_>>().join(sep)
}

fn compile(pattern: &str) -> CoreResult<Regex> {
    Regex::new(pattern).map_err(|e| CoreError::InvalidInput(format!("regex {}: {}", pattern, e)))
}

fn case_insensitive(pattern: &str) -> CoreResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| CoreError::InvalidInput(format!("regex {}: {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner(cfg: ValidatorConfig) -> PolicyScanner {
        PolicyScanner::new(&cfg).unwrap()
    }

    #[test]
    fn junk_matches_prefix_and_basename() {
        let s = scanner(ValidatorConfig::default());
        let c = s.check_junk(&["index.html", "__MACOSX/._index.html", "img/.DS_Store"]);
        assert_eq!(c.status, Status::Red);
        assert_eq!(c.help, "__MACOSX/._index.html, img/.DS_Store");
        assert_eq!(s.check_junk(&["index.html"]).status, Status::Green);
    }

    #[test]
    fn junk_help_lists_at_most_eight() {
        let s = scanner(ValidatorConfig::default());
        let names: Vec<String> = (0..12).map(|i| format!("d{}/Thumbs.db", i)).collect();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let c = s.check_junk(&refs);
        assert_eq!(c.help.split(", ").count(), 8);
    }

    #[test]
    fn root_index_respects_requirement_flag() {
        let required = scanner(ValidatorConfig::default());
        assert_eq!(required.check_root_index(true).status, Status::Green);
        assert_eq!(required.check_root_index(false).status, Status::Red);

        let optional = scanner(ValidatorConfig {
            require_root_index: false,
            ..ValidatorConfig::default()
        });
        assert_eq!(optional.check_root_index(true).status, Status::Green);
        assert_eq!(optional.check_root_index(false).status, Status::Green);
    }

    #[test]
    fn extensions_partition_into_denied_and_unlisted() {
        let s = scanner(ValidatorConfig::default());
        let (denied, unlisted) =
            s.check_extensions(&["index.html", "run.EXE", "notes.md", "img/", "LICENSE"]);
        assert_eq!(denied.status, Status::Red);
        assert_eq!(denied.value, "Present");
        assert_eq!(denied.help, "run.EXE");
        assert_eq!(unlisted.status, Status::Yellow);
        assert_eq!(unlisted.value, "1");
        assert_eq!(unlisted.help, "notes.md");
    }

    #[test]
    fn backup_found_at_root_or_nested() {
        let s = scanner(ValidatorConfig::default());
        assert_eq!(s.check_backup(&["fallback.png"]).status, Status::Green);
        assert_eq!(s.check_backup(&["img/Backup.JPG"]).status, Status::Green);
        assert_eq!(s.check_backup(&["mybackup.png"]).status, Status::Red);
        assert_eq!(s.check_backup(&["backup.svg"]).status, Status::Red);
    }

    #[test]
    fn external_urls_are_unique_sorted_and_gray_when_allowed() {
        let s = scanner(ValidatorConfig::default());
        let text = "a('https://b.example/x.js'); b(\"http://a.example\"); c('https://b.example/x.js')";
        let c = s.check_external_urls(text);
        assert_eq!(c.status, Status::Red);
        assert_eq!(c.value, "2");
        assert_eq!(c.help, "http://a.example https://b.example/x.js");

        let allowed = scanner(ValidatorConfig {
            allow_remote_urls: true,
            ..ValidatorConfig::default()
        });
        let c = allowed.check_external_urls(text);
        assert_eq!(c.status, Status::Gray);
    }

    #[test]
    fn cookie_and_document_write_patterns() {
        let s = scanner(ValidatorConfig::default());
        assert_eq!(s.check_cookies("document.cookie = 'a=1'").status, Status::Red);
        assert_eq!(s.check_cookies("var c = document.cookie;").status, Status::Green);
        assert_eq!(s.check_document_write("Document.Write ('<p>')").status, Status::Red);
        assert_eq!(s.check_document_write("document.writeln").status, Status::Green);
    }

    #[test]
    fn click_through_detection() {
        let s = scanner(ValidatorConfig::default());
        assert_eq!(s.check_click_through("var clickTag = '';").status, Status::Green);
        assert_eq!(s.check_click_through("window.open(url)").status, Status::Red);
    }

    #[test]
    fn minified_check_walks_extracted_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("js")).unwrap();
        std::fs::write(
            dir.path().join("js/app.js"),
            "var a=1,b=2;function f(x){return x*a+b}".repeat(10),
        )
        .unwrap();
        std::fs::write(dir.path().join("style.css"), "body {\n  margin: 0;\n}\n").unwrap();
        let c = scanner(ValidatorConfig::default()).check_minified(dir.path());
        assert_eq!(c.status, Status::Green);
        assert_eq!(c.value, "JS");
    }
}
