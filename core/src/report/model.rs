use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Path template for the extracted root document; the web layer fills `{run_id}`.
pub const ENTRY_URL_TEMPLATE: &str = "/runs/{run_id}/file/index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Green,
    Yellow,
    Red,
    /// Not evaluated: capability missing or not applicable.
    Gray,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Green => "green",
            Status::Yellow => "yellow",
            Status::Red => "red",
            Status::Gray => "gray",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Status::Gray => 0,
            Status::Green => 1,
            Status::Yellow => 2,
            Status::Red => 3,
        }
    }

    pub fn worse(self, other: Status) -> Status {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Archive,
    Policy,
    Runtime,
    Network,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub category: Category,
    pub label: String,
    pub status: Status,
    pub value: String,
    #[serde(default)]
    pub help: String,
}

impl Check {
    pub fn new(id: &str, category: Category, label: &str, status: Status, value: &str) -> Self {
        Self {
            id: id.to_string(),
            category,
            label: label.to_string(),
            status,
            value: value.to_string(),
            help: String::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub compressed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRequestRecord {
    pub url: String,
    pub status: Option<u32>,
    pub protocol: Option<String>,
    pub enc: Option<String>,
    pub bytes: Option<u64>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: 300,
            height: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMetrics {
    pub dom_content_loaded_ms: Option<u64>,
    pub time_to_visual_start_ms: Option<u64>,
    pub console_errors: u64,
    pub console_warnings: u64,
    /// `-1` when any element animates infinitely.
    pub animation_duration_ms: Option<i64>,
    pub dimensions: Dimensions,
    pub network_requests: Vec<NetworkRequestRecord>,
    /// Requests seen but not recorded; the network checks are incomplete when nonzero.
    #[serde(default)]
    pub requests_dropped: u64,
    pub cpu_busy_ms_5s: Option<u64>,
    pub js_heap_kb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub t_sec: f64,
    /// `data:image/png;base64,...`
    pub png_b64: String,
    pub file: String,
    #[serde(skip)]
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub browser: bool,
    pub images: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub scan_type: String,
    pub api_version: String,
    pub hardware: String,
    pub unix_timestamp: i64,
    pub scanned_at: String,
    /// Seconds, two decimals.
    pub scan_duration: f64,
    pub creative_type: String,
    pub original_name: String,
    pub device: String,
    pub language: String,
    pub user_agent: String,
    pub run_id: String,
    pub archive_sha256: String,
    pub capabilities: Capabilities,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub results: Vec<Check>,
    pub archive: Vec<ArchiveEntry>,
    #[serde(
        serialize_with = "serialize_runtime",
        deserialize_with = "deserialize_runtime",
        default
    )]
    pub runtime: Option<RuntimeMetrics>,
    pub thumbnails: Vec<Thumbnail>,
    pub metadata: ScanMetadata,
    pub entry_url: String,
}

impl Report {
    pub fn check(&self, id: &str) -> Option<&Check> {
        self.results.iter().find(|c| c.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<Status> {
        self.check(id).map(|c| c.status)
    }

    pub fn worst_status(&self) -> Status {
        self.results
            .iter()
            .fold(Status::Gray, |acc, c| acc.worse(c.status))
    }

    pub fn has_red(&self) -> bool {
        self.results.iter().any(|c| c.status == Status::Red)
    }

    pub fn entry_url_for(&self, run_id: &str) -> String {
        self.entry_url.replace("{run_id}", run_id)
    }
}

/// What the caller receives when the archive itself cannot be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: String,
}

impl From<&crate::error::CoreError> for ErrorReport {
    fn from(e: &crate::error::CoreError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

// An absent runtime section is written as `{}`.
fn serialize_runtime<S: Serializer>(
    runtime: &Option<RuntimeMetrics>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match runtime {
        Some(m) => m.serialize(s),
        None => serde_json::Map::new().serialize(s),
    }
}

fn deserialize_runtime<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<RuntimeMetrics>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    match &v {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(m) if m.is_empty() => Ok(None),
        _ => serde_json::from_value(v)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
