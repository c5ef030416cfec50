use crate::error::{CoreError, CoreResult};
use crate::report::model::{
    ArchiveEntry, Capabilities, Check, Report, RuntimeMetrics, ScanMetadata, Thumbnail,
    ENTRY_URL_TEMPLATE,
};
use std::collections::BTreeSet;
use std::time::Duration;

/// Identity of one scan, fixed before any component runs.
#[derive(Debug, Clone)]
pub struct ScanDescriptor {
    pub run_id: String,
    pub original_name: String,
    pub archive_sha256: String,
    pub user_agent: String,
    pub capabilities: Capabilities,
}

/// Component outputs, with check groups in the order they were produced.
#[derive(Debug, Default)]
pub struct ReportParts {
    pub check_groups: Vec<Vec<Check>>,
    pub archive: Vec<ArchiveEntry>,
    pub runtime: Option<RuntimeMetrics>,
    pub thumbnails: Vec<Thumbnail>,
    pub warnings: Vec<String>,
}

pub struct ReportAssembler {
    descriptor: ScanDescriptor,
}

impl ReportAssembler {
    pub fn new(descriptor: ScanDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn assemble(&self, parts: ReportParts, elapsed: Duration) -> CoreResult<Report> {
        let results: Vec<Check> = parts.check_groups.into_iter().flatten().collect();

        let mut seen = BTreeSet::new();
        for c in &results {
            if !seen.insert(c.id.as_str()) {
                return Err(CoreError::InvalidInput(format!(
                    "duplicate check id in report: {}",
                    c.id
                )));
            }
        }

        Ok(Report {
            results,
            archive: parts.archive,
            runtime: parts.runtime,
            thumbnails: parts.thumbnails,
            metadata: self.metadata(elapsed, parts.warnings),
            entry_url: ENTRY_URL_TEMPLATE.to_string(),
        })
    }

    fn metadata(&self, elapsed: Duration, warnings: Vec<String>) -> ScanMetadata {
        let now = time::OffsetDateTime::now_utc();
        let d = &self.descriptor;
        ScanMetadata {
            scan_type: "Local Web scan".to_string(),
            api_version: "v1".to_string(),
            hardware: "Local".to_string(),
            unix_timestamp: now.unix_timestamp(),
            scanned_at: now
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            scan_duration: round2(elapsed.as_secs_f64()),
            creative_type: "HTML5 Zip".to_string(),
            original_name: d.original_name.clone(),
            device: "Desktop".to_string(),
            language: "en-US".to_string(),
            user_agent: d.user_agent.clone(),
            run_id: d.run_id.clone(),
            archive_sha256: d.archive_sha256.clone(),
            capabilities: d.capabilities,
            warnings,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
