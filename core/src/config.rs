use crate::error::{CoreError, CoreResult};
use crate::policy::minify::MinifyThresholds;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_ZIP_BYTES: u64 = 200 * 1024;
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;
pub const DEFAULT_DCL_MS_GOOD: u64 = 1000;
pub const DEFAULT_VISUAL_MS_GOOD: u64 = 1500;
pub const DEFAULT_ANIMATION_MAX_MS: u64 = 15_000;
pub const DEFAULT_MAX_IMAGE_SIDE: u32 = 2048;

const DEFAULT_ALLOW_EXT: &[&str] = &[
    ".html", ".htm", ".js", ".css", ".json", ".txt", ".png", ".jpg", ".jpeg", ".gif", ".svg",
    ".webp", ".woff", ".woff2", ".ttf", ".otf", ".eot", ".mp4", ".webm",
];
const DEFAULT_DENY_EXT: &[&str] = &[
    ".exe", ".bat", ".cmd", ".com", ".sh", ".ps1", ".vbs", ".msi", ".dll", ".jar", ".php", ".py",
    ".scr", ".swf",
];
const DEFAULT_JUNK_PREFIXES: &[&str] = &["__MACOSX/", ".git/", ".svn/", ".idea/", ".vscode/"];
const DEFAULT_JUNK_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];
const DEFAULT_CLICK_PATTERNS: &[&str] = &[r"clicktag\w*\s*[=:]", r"Enabler\.exit", r"ExitApi\.exit"];

#[derive(Debug, Clone, Serialize)]
pub struct ValidatorConfig {
    pub max_zip_bytes: u64,
    /// Decompressed bytes read per entry before it is skipped.
    pub max_entry_bytes: u64,
    pub require_root_index: bool,
    pub allow_ext: BTreeSet<String>,
    pub deny_ext: BTreeSet<String>,
    pub junk_prefixes: Vec<String>,
    pub junk_files: Vec<String>,
    pub click_patterns: Vec<String>,
    pub allow_remote_urls: bool,
    pub dcl_ms_good: u64,
    pub visual_ms_good: u64,
    pub animation_max_ms: u64,
    pub max_image_side: u32,
    pub minify: MinifyThresholds,
    pub probe: ProbeConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
    pub sandbox: bool,
    pub navigation_timeout_ms: u64,
    pub evaluation_timeout_ms: u64,
    pub cpu_window_timeout_ms: u64,
    pub screenshot_timeout_ms: u64,
    pub telemetry_capacity: usize,
}

impl ProbeConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }

    pub fn cpu_window_timeout(&self) -> Duration {
        Duration::from_millis(self.cpu_window_timeout_ms)
    }

    pub fn screenshot_timeout(&self) -> Duration {
        Duration::from_millis(self.screenshot_timeout_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chrome_path: None,
            sandbox: true,
            navigation_timeout_ms: 30_000,
            evaluation_timeout_ms: 10_000,
            cpu_window_timeout_ms: 15_000,
            screenshot_timeout_ms: 10_000,
            telemetry_capacity: 4096,
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_zip_bytes: DEFAULT_MAX_ZIP_BYTES,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            require_root_index: true,
            allow_ext: DEFAULT_ALLOW_EXT.iter().map(|s| s.to_string()).collect(),
            deny_ext: DEFAULT_DENY_EXT.iter().map(|s| s.to_string()).collect(),
            junk_prefixes: to_strings(DEFAULT_JUNK_PREFIXES),
            junk_files: to_strings(DEFAULT_JUNK_FILES),
            click_patterns: to_strings(DEFAULT_CLICK_PATTERNS),
            allow_remote_urls: false,
            dcl_ms_good: DEFAULT_DCL_MS_GOOD,
            visual_ms_good: DEFAULT_VISUAL_MS_GOOD,
            animation_max_ms: DEFAULT_ANIMATION_MAX_MS,
            max_image_side: DEFAULT_MAX_IMAGE_SIDE,
            minify: MinifyThresholds::default(),
            probe: ProbeConfig::default(),
            config_path: None,
        }
    }
}

impl ValidatorConfig {
    /// Click-through patterns are always matched case-insensitively.
    pub fn compile_click_patterns(&self) -> CoreResult<Vec<Regex>> {
        self.click_patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| CoreError::Config(format!("click_patterns {:?}: {}", p, e)))
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    max_zip_bytes: Option<u64>,
    max_entry_bytes: Option<u64>,
    require_root_index: Option<bool>,
    allow_ext: Option<Vec<String>>,
    deny_ext: Option<Vec<String>>,
    junk_prefixes: Option<Vec<String>>,
    junk_files: Option<Vec<String>>,
    click_patterns: Option<Vec<String>>,
    allow_remote_urls: Option<bool>,
    dcl_ms_good: Option<u64>,
    visual_ms_good: Option<u64>,
    animation_max_ms: Option<u64>,
    max_image_side: Option<u32>,
    minify_avg_line_len: Option<f64>,
    minify_whitespace_ratio: Option<f64>,
    probe: Option<RawProbeConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProbeConfig {
    enabled: Option<bool>,
    chrome_path: Option<PathBuf>,
    sandbox: Option<bool>,
    navigation_timeout_ms: Option<u64>,
    evaluation_timeout_ms: Option<u64>,
    cpu_window_timeout_ms: Option<u64>,
    screenshot_timeout_ms: Option<u64>,
    telemetry_capacity: Option<usize>,
}

/// Defaults, then the TOML file (if given), then `ADZIP_*` environment overrides.
pub fn load(config_path: Option<&Path>) -> CoreResult<ValidatorConfig> {
    let mut cfg = ValidatorConfig::default();

    if let Some(path) = config_path {
        let s = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let raw: RawConfig = toml::from_str(&s)
            .map_err(|e| CoreError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn from_toml_str(s: &str) -> CoreResult<ValidatorConfig> {
    let raw: RawConfig =
        toml::from_str(s).map_err(|e| CoreError::Config(format!("invalid TOML: {}", e)))?;
    let mut cfg = ValidatorConfig::default();
    apply_raw_config(&mut cfg, raw);
    validate(&cfg)?;
    Ok(cfg)
}

fn apply_raw_config(cfg: &mut ValidatorConfig, raw: RawConfig) {
    if let Some(v) = raw.max_zip_bytes {
        cfg.max_zip_bytes = v;
    }
    if let Some(v) = raw.max_entry_bytes {
        cfg.max_entry_bytes = v;
    }
    if let Some(v) = raw.require_root_index {
        cfg.require_root_index = v;
    }
    if let Some(v) = raw.allow_ext {
        cfg.allow_ext = normalize_exts(&v);
    }
    if let Some(v) = raw.deny_ext {
        cfg.deny_ext = normalize_exts(&v);
    }
    if let Some(v) = raw.junk_prefixes {
        cfg.junk_prefixes = v;
    }
    if let Some(v) = raw.junk_files {
        cfg.junk_files = v;
    }
    if let Some(v) = raw.click_patterns {
        cfg.click_patterns = v;
    }
    if let Some(v) = raw.allow_remote_urls {
        cfg.allow_remote_urls = v;
    }
    if let Some(v) = raw.dcl_ms_good {
        cfg.dcl_ms_good = v;
    }
    if let Some(v) = raw.visual_ms_good {
        cfg.visual_ms_good = v;
    }
    if let Some(v) = raw.animation_max_ms {
        cfg.animation_max_ms = v;
    }
    if let Some(v) = raw.max_image_side {
        cfg.max_image_side = v;
    }
    if let Some(v) = raw.minify_avg_line_len {
        cfg.minify.avg_line_len = v;
    }
    if let Some(v) = raw.minify_whitespace_ratio {
        cfg.minify.whitespace_ratio = v;
    }

    if let Some(probe) = raw.probe {
        if let Some(v) = probe.enabled {
            cfg.probe.enabled = v;
        }
        if let Some(v) = probe.chrome_path {
            cfg.probe.chrome_path = Some(v);
        }
        if let Some(v) = probe.sandbox {
            cfg.probe.sandbox = v;
        }
        if let Some(v) = probe.navigation_timeout_ms {
            cfg.probe.navigation_timeout_ms = v;
        }
        if let Some(v) = probe.evaluation_timeout_ms {
            cfg.probe.evaluation_timeout_ms = v;
        }
        if let Some(v) = probe.cpu_window_timeout_ms {
            cfg.probe.cpu_window_timeout_ms = v;
        }
        if let Some(v) = probe.screenshot_timeout_ms {
            cfg.probe.screenshot_timeout_ms = v;
        }
        if let Some(v) = probe.telemetry_capacity {
            cfg.probe.telemetry_capacity = v;
        }
    }
}

pub(crate) fn apply_env_overrides<F>(cfg: &mut ValidatorConfig, lookup: F) -> CoreResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("ADZIP_MAX_ZIP_BYTES") {
        cfg.max_zip_bytes = parse_u64("ADZIP_MAX_ZIP_BYTES", &v)?;
    }
    if let Some(v) = lookup("ADZIP_MAX_ENTRY_BYTES") {
        cfg.max_entry_bytes = parse_u64("ADZIP_MAX_ENTRY_BYTES", &v)?;
    }
    if let Some(v) = lookup("ADZIP_REQUIRE_ROOT_INDEX") {
        cfg.require_root_index = parse_bool("ADZIP_REQUIRE_ROOT_INDEX", &v)?;
    }
    if let Some(v) = lookup("ADZIP_ALLOW_REMOTE_URLS") {
        cfg.allow_remote_urls = parse_bool("ADZIP_ALLOW_REMOTE_URLS", &v)?;
    }
    if let Some(v) = lookup("ADZIP_DCL_MS_GOOD") {
        cfg.dcl_ms_good = parse_u64("ADZIP_DCL_MS_GOOD", &v)?;
    }
    if let Some(v) = lookup("ADZIP_VISUAL_MS_GOOD") {
        cfg.visual_ms_good = parse_u64("ADZIP_VISUAL_MS_GOOD", &v)?;
    }
    if let Some(v) = lookup("ADZIP_ANIMATION_MAX_MS") {
        cfg.animation_max_ms = parse_u64("ADZIP_ANIMATION_MAX_MS", &v)?;
    }
    if let Some(v) = lookup("ADZIP_PROBE_ENABLED") {
        cfg.probe.enabled = parse_bool("ADZIP_PROBE_ENABLED", &v)?;
    }
    if let Some(v) = lookup("ADZIP_CHROME_PATH") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.probe.chrome_path = Some(PathBuf::from(v));
        }
    }
    Ok(())
}

fn validate(cfg: &ValidatorConfig) -> CoreResult<()> {
    cfg.compile_click_patterns()?;
    if !(0.0..=1.0).contains(&cfg.minify.whitespace_ratio) {
        return Err(CoreError::Config(format!(
            "minify_whitespace_ratio must be within 0..=1, got {}",
            cfg.minify.whitespace_ratio
        )));
    }
    if cfg.max_entry_bytes == 0 {
        return Err(CoreError::Config("max_entry_bytes must be > 0".to_string()));
    }
    if cfg.probe.telemetry_capacity == 0 {
        return Err(CoreError::Config(
            "probe.telemetry_capacity must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Lowercase with a leading dot, so `PNG` and `.png` are the same entry.
pub fn normalize_ext(ext: &str) -> String {
    let e = ext.trim().to_ascii_lowercase();
    if e.starts_with('.') {
        e
    } else {
        format!(".{}", e)
    }
}

fn normalize_exts(v: &[String]) -> BTreeSet<String> {
    v.iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| normalize_ext(s))
        .collect()
}

fn to_strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn parse_u64(key: &str, s: &str) -> CoreResult<u64> {
    s.trim()
        .parse::<u64>()
        .map_err(|e| CoreError::Config(format!("{}: {}", key, e)))
}

fn parse_bool(key: &str, s: &str) -> CoreResult<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CoreError::Config(format!(
            "{}: invalid boolean {:?} (use true|false|1|0|yes|no|on|off)",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn toml_overrides_only_present_keys() {
        let cfg = from_toml_str(
            r#"
max_zip_bytes = 150000
allow_ext = ["PNG", "html"]

[probe]
enabled = false
navigation_timeout_ms = 5000
"#,
        )
        .unwrap();
        assert_eq!(cfg.max_zip_bytes, 150_000);
        assert!(cfg.allow_ext.contains(".png"));
        assert!(cfg.allow_ext.contains(".html"));
        assert_eq!(cfg.allow_ext.len(), 2);
        assert!(!cfg.probe.enabled);
        assert_eq!(cfg.probe.navigation_timeout_ms, 5000);
        assert_eq!(cfg.probe.evaluation_timeout_ms, 10_000);
        assert_eq!(cfg.dcl_ms_good, DEFAULT_DCL_MS_GOOD);
    }

    #[test]
    fn entry_read_cap_is_configurable_and_nonzero() {
        assert_eq!(ValidatorConfig::default().max_entry_bytes, DEFAULT_MAX_ENTRY_BYTES);
        let cfg = from_toml_str("max_entry_bytes = 4096").unwrap();
        assert_eq!(cfg.max_entry_bytes, 4096);
        let err = from_toml_str("max_entry_bytes = 0").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn invalid_click_pattern_is_config_error() {
        let err = from_toml_str("click_patterns = [\"(unclosed\"]").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn env_overrides_apply_and_reject_bad_bools() {
        let env: HashMap<&str, &str> = [
            ("ADZIP_ALLOW_REMOTE_URLS", "yes"),
            ("ADZIP_MAX_ZIP_BYTES", " 1024 "),
        ]
        .into_iter()
        .collect();
        let mut cfg = ValidatorConfig::default();
        apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert!(cfg.allow_remote_urls);
        assert_eq!(cfg.max_zip_bytes, 1024);

        let mut cfg = ValidatorConfig::default();
        let err = apply_env_overrides(&mut cfg, |k| {
            (k == "ADZIP_PROBE_ENABLED").then(|| "maybe".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn default_click_patterns_are_case_insensitive() {
        let pats = ValidatorConfig::default().compile_click_patterns().unwrap();
        assert!(pats.iter().any(|p| p.is_match("var clickTAG = \"\";")));
        assert!(pats.iter().any(|p| p.is_match("Enabler.exit('bg')")));
    }
}
