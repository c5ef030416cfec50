use adzip_core::config::ValidatorConfig;
use adzip_core::error::CoreError;
use adzip_core::image_audit::{ImageDecoder, NullImageDecoder};
use adzip_core::report::{ErrorReport, Report, Status};
use adzip_core::run::RunWorkspace;
use adzip_core::runtime::NullBrowserDriver;
use adzip_core::{CapabilitySet, CreativeValidator};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;

fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        w.start_file(*name, SimpleFileOptions::default()).unwrap();
        w.write_all(body).unwrap();
    }
    w.finish().unwrap().into_inner()
}

fn analyze_with(cfg: ValidatorConfig, bytes: &[u8], runs: &Path, run_id: &str) -> Report {
    let ws = RunWorkspace::create_with_id(runs, run_id).unwrap();
    CreativeValidator::new(cfg, CapabilitySet::none())
        .analyze(bytes, "creative.zip", &ws)
        .unwrap()
}

const MINIMAL_INDEX: &[u8] = b"<!doctype html><html><head><meta name=\"ad.size\" content=\"width=300,height=250\"></head>\
<body><div id=\"ad\">Sale</div><script>var clickTag = \"\";\
document.getElementById('ad').onclick = function(){ window.open(window.clickTag); };</script></body></html>";

#[test]
fn minimal_clean_creative_passes_policy_checks() {
    let bytes = build_zip(&[("index.html", MINIMAL_INDEX), ("fallback.png", b"\x89PNG\r\n")]);
    let dir = tempfile::tempdir().unwrap();
    let report = analyze_with(ValidatorConfig::default(), &bytes, dir.path(), "r_MIN");

    for id in [
        "junk_files",
        "index_html",
        "has_backup_ad",
        "click_through",
        "external_urls",
        "cookies_dropped",
    ] {
        assert_eq!(report.status_of(id), Some(Status::Green), "{}", id);
    }
    assert_eq!(report.status_of("compressed_file_size"), Some(Status::Green));
    assert_eq!(report.status_of("document_write"), Some(Status::Green));
    assert!(!report.has_red());
    assert_eq!(report.archive.len(), 2);
    assert_eq!(report.metadata.original_name, "creative.zip");
    assert_eq!(report.metadata.run_id, "r_MIN");
    assert_eq!(report.metadata.archive_sha256.len(), 64);
    assert!(dir.path().join("r_MIN/unzipped/index.html").is_file());
}

#[test]
fn denied_executable_is_red_and_missing_index_is_red() {
    let bytes = build_zip(&[("malware.exe", b"MZ\x90\x00")]);
    let dir = tempfile::tempdir().unwrap();
    let report = analyze_with(ValidatorConfig::default(), &bytes, dir.path(), "r_EXE");

    assert_eq!(report.status_of("denied_ext"), Some(Status::Red));
    assert!(report.check("denied_ext").unwrap().help.contains("malware.exe"));
    assert_eq!(report.status_of("index_html"), Some(Status::Red));
    assert_eq!(report.status_of("text_compressed_size"), Some(Status::Gray));
    assert_eq!(report.worst_status(), Status::Red);
}

#[test]
fn root_index_requirement_is_configurable() {
    let bytes = build_zip(&[("banner/index.html", MINIMAL_INDEX)]);
    let dir = tempfile::tempdir().unwrap();

    let required = analyze_with(ValidatorConfig::default(), &bytes, dir.path(), "r_REQ");
    assert_eq!(required.status_of("index_html"), Some(Status::Red));

    let relaxed = ValidatorConfig {
        require_root_index: false,
        ..ValidatorConfig::default()
    };
    let report = analyze_with(relaxed, &bytes, dir.path(), "r_RELAX");
    assert_eq!(report.status_of("index_html"), Some(Status::Green));

    let with_root = build_zip(&[("index.html", MINIMAL_INDEX)]);
    let relaxed = ValidatorConfig {
        require_root_index: false,
        ..ValidatorConfig::default()
    };
    let report = analyze_with(relaxed, &with_root, dir.path(), "r_ROOT");
    assert_eq!(report.status_of("index_html"), Some(Status::Green));
}

#[test]
fn size_boundary_is_inclusive_end_to_end() {
    let bytes = build_zip(&[("index.html", MINIMAL_INDEX)]);
    let n = bytes.len() as u64;
    let dir = tempfile::tempdir().unwrap();

    let at = ValidatorConfig {
        max_zip_bytes: n,
        ..ValidatorConfig::default()
    };
    let report = analyze_with(at, &bytes, dir.path(), "r_AT");
    assert_eq!(report.status_of("compressed_file_size"), Some(Status::Green));

    let under = ValidatorConfig {
        max_zip_bytes: n - 1,
        ..ValidatorConfig::default()
    };
    let report = analyze_with(under, &bytes, dir.path(), "r_UNDER");
    assert_eq!(report.status_of("compressed_file_size"), Some(Status::Red));
}

#[test]
fn remote_urls_and_cookies_are_flagged() {
    let index = b"<html><script>var clickTag='';document.cookie = 'seen=1';\
fetch('https://tracker.example.com/p?x=1');document.write('<b>hi</b>');</script></html>";
    let bytes = build_zip(&[("index.html", index as &[u8]), ("backup.jpg", b"\xff\xd8")]);
    let dir = tempfile::tempdir().unwrap();

    let report = analyze_with(ValidatorConfig::default(), &bytes, dir.path(), "r_REMOTE");
    assert_eq!(report.status_of("external_urls"), Some(Status::Red));
    assert!(report
        .check("external_urls")
        .unwrap()
        .help
        .contains("https://tracker.example.com/p?x=1"));
    assert_eq!(report.status_of("cookies_dropped"), Some(Status::Red));
    assert_eq!(report.status_of("document_write"), Some(Status::Red));

    let allowed = ValidatorConfig {
        allow_remote_urls: true,
        ..ValidatorConfig::default()
    };
    let report = analyze_with(allowed, &bytes, dir.path(), "r_ALLOWED");
    assert_eq!(report.status_of("external_urls"), Some(Status::Gray));
}

#[test]
fn escaping_script_is_still_scanned_and_counted() {
    let evil: &[u8] = b"document.cookie = 'id=1'; new Image().src = 'http://tracker.example/p.gif';";
    let bytes = build_zip(&[("index.html", MINIMAL_INDEX), ("../evil.js", evil)]);
    let dir = tempfile::tempdir().unwrap();
    let report = analyze_with(ValidatorConfig::default(), &bytes, dir.path(), "r_SLIP");

    assert_eq!(report.status_of("cookies_dropped"), Some(Status::Red));
    assert_eq!(report.status_of("external_urls"), Some(Status::Red));
    let compressed = report.check("text_compressed_size").unwrap();
    let raw_total = (MINIMAL_INDEX.len() + evil.len()) as u64;
    assert!(compressed.help.contains(&adzip_core::report::human_bytes(raw_total)));
    assert!(!dir.path().join("r_SLIP/evil.js").exists());
    assert!(report
        .metadata
        .warnings
        .iter()
        .any(|w| w.contains("../evil.js") && w.contains("escapes")));
}

// Rewrites the uncompressed size of the first central directory record. The
// 32-bit field is set to 0xFFFFFFFF so readers take the ZIP64 value instead.
fn patch_zip64_declared_size(bytes: &mut [u8], size: u64) {
    let cd = bytes
        .windows(4)
        .position(|w| w == b"PK\x01\x02")
        .expect("central directory record");
    bytes[cd + 24..cd + 28].copy_from_slice(&u32::MAX.to_le_bytes());
    let u16_at = |b: &[u8], i: usize| u16::from_le_bytes([b[i], b[i + 1]]) as usize;
    let name_len = u16_at(&*bytes, cd + 28);
    let extra_len = u16_at(&*bytes, cd + 30);
    let mut i = cd + 46 + name_len;
    let end = i + extra_len;
    while i + 4 <= end {
        let id = u16_at(&*bytes, i);
        let len = u16_at(&*bytes, i + 2);
        if id == 0x0001 {
            bytes[i + 4..i + 12].copy_from_slice(&size.to_le_bytes());
            return;
        }
        i += 4 + len;
    }
    panic!("no zip64 extra field");
}

#[test]
fn absurd_declared_entry_size_does_not_abort_the_run() {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .large_file(true);
    w.start_file("index.html", opts).unwrap();
    w.write_all(MINIMAL_INDEX).unwrap();
    let mut bytes = w.finish().unwrap().into_inner();
    patch_zip64_declared_size(&mut bytes, 0xFFFF_FFFF_FFFF_FF00);

    let dir = tempfile::tempdir().unwrap();
    let ws = RunWorkspace::create_with_id(dir.path(), "r_ZIP64").unwrap();
    let report = CreativeValidator::new(ValidatorConfig::default(), CapabilitySet::none())
        .analyze(&bytes, "zip64.zip", &ws)
        .expect("structured report");

    assert_eq!(report.archive.len(), 1);
    assert_eq!(report.archive[0].size, 0xFFFF_FFFF_FFFF_FF00);
    assert_eq!(report.status_of("index_html"), Some(Status::Green));
}

#[test]
fn entries_over_the_read_cap_become_warnings() {
    let bundle = "var a = 1;\n".repeat(400);
    let bytes = build_zip(&[("index.html", MINIMAL_INDEX), ("bundle.js", bundle.as_bytes())]);
    let dir = tempfile::tempdir().unwrap();
    let cfg = ValidatorConfig {
        max_entry_bytes: 1024,
        ..ValidatorConfig::default()
    };
    let report = analyze_with(cfg, &bytes, dir.path(), "r_CAP");

    assert_eq!(report.archive.len(), 2);
    assert!(!dir.path().join("r_CAP/unzipped/bundle.js").exists());
    assert!(report
        .metadata
        .warnings
        .iter()
        .any(|w| w.starts_with("extract skipped bundle.js") && w.contains("exceeds 1024 bytes")));
}

#[test]
fn check_ids_are_unique_and_grouped_by_category() {
    let bytes = build_zip(&[
        ("index.html", MINIMAL_INDEX),
        ("__MACOSX/._index.html", b"junk"),
        ("styles/main.css", b"body { margin: 0; }\n"),
        ("notes.md", b"# notes"),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let report = analyze_with(ValidatorConfig::default(), &bytes, dir.path(), "r_IDS");

    let mut ids: Vec<&str> = report.results.iter().map(|c| c.id.as_str()).collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);

    assert_eq!(report.status_of("junk_files"), Some(Status::Red));
    assert_eq!(report.status_of("unlisted_ext"), Some(Status::Yellow));
    assert_eq!(report.status_of("minified_css_js"), Some(Status::Yellow));

    // Archive checks precede policy checks; no runtime section without a browser.
    let cats: Vec<String> = report
        .results
        .iter()
        .map(|c| format!("{:?}", c.category))
        .collect();
    let first_policy = cats.iter().position(|c| c == "Policy").unwrap();
    assert!(cats[..first_policy].iter().all(|c| c == "Archive"));
    assert!(!cats.iter().any(|c| c == "Runtime"));
}

struct TallDecoder;

impl ImageDecoder for TallDecoder {
    fn name(&self) -> &str {
        "tall"
    }

    fn dimensions(&self, bytes: &[u8]) -> adzip_core::error::CoreResult<(u32, u32)> {
        if bytes.starts_with(b"BAD") {
            return Err(CoreError::DecodeFailure("corrupt".to_string()));
        }
        Ok((300, 4096))
    }
}

#[test]
fn injected_image_decoder_drives_the_image_check() {
    let bytes = build_zip(&[
        ("index.html", MINIMAL_INDEX),
        ("hero.png", b"PNGDATA"),
        ("broken.jpg", b"BAD"),
        ("logo.svg", b"<svg/>"),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let ws = RunWorkspace::create_with_id(dir.path(), "r_IMG").unwrap();
    let caps = CapabilitySet {
        images: Box::new(TallDecoder),
        browser: Box::new(NullBrowserDriver),
    };
    let report = CreativeValidator::new(ValidatorConfig::default(), caps)
        .analyze(&bytes, "img.zip", &ws)
        .unwrap();

    let c = report.check("image_dimensions").unwrap();
    assert_eq!(c.status, Status::Yellow);
    assert!(c.help.contains("hero.png (300x4096)"));
    assert!(!c.help.contains("logo.svg"));
    assert!(report.metadata.capabilities.images);
    assert!(report
        .metadata
        .warnings
        .iter()
        .any(|w| w.contains("broken.jpg")));
}

#[test]
fn without_decoder_image_check_is_gray() {
    let bytes = build_zip(&[("index.html", MINIMAL_INDEX), ("hero.png", b"PNGDATA")]);
    let dir = tempfile::tempdir().unwrap();
    let ws = RunWorkspace::create_with_id(dir.path(), "r_NOIMG").unwrap();
    let caps = CapabilitySet {
        images: Box::new(NullImageDecoder),
        browser: Box::new(NullBrowserDriver),
    };
    let report = CreativeValidator::new(ValidatorConfig::default(), caps)
        .analyze(&bytes, "img.zip", &ws)
        .unwrap();
    assert_eq!(report.status_of("image_dimensions"), Some(Status::Gray));
    assert!(!report.metadata.capabilities.images);
}

#[test]
fn unreadable_archive_yields_error_object() {
    let dir = tempfile::tempdir().unwrap();
    let ws = RunWorkspace::create_with_id(dir.path(), "r_BROKEN").unwrap();
    let err = CreativeValidator::new(ValidatorConfig::default(), CapabilitySet::none())
        .analyze(b"not a zip at all", "broken.zip", &ws)
        .unwrap_err();
    let body = serde_json::to_value(ErrorReport::from(&err)).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid ZIP:"));
}

#[test]
fn run_directories_are_never_reused() {
    let dir = tempfile::tempdir().unwrap();
    RunWorkspace::create_with_id(dir.path(), "r_ONCE").unwrap();
    assert!(RunWorkspace::create_with_id(dir.path(), "r_ONCE").is_err());

    let a = RunWorkspace::create(dir.path()).unwrap();
    let b = RunWorkspace::create(dir.path()).unwrap();
    assert_ne!(a.run_id, b.run_id);
    assert!(a.extract_dir().is_dir());
}
