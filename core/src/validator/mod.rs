use crate::archive::{ArchiveInspector, InspectedArchive};
use crate::config::ValidatorConfig;
use crate::error::{CoreError, CoreResult};
use crate::image_audit::{default_decoder, ImageAudit, ImageAuditor, ImageDecoder};
use crate::logging::LogContext;
use crate::outcome::Skip;
use crate::policy::{PolicyFindings, PolicyScanner};
use crate::report::{Capabilities, Report, ReportAssembler, ReportParts, ScanDescriptor};
use crate::run::{sha256_hex, RunWorkspace};
use crate::runtime::{
    derive_checks, BrowserDriver, Clock, NullBrowserDriver, ProbeOutcome, RuntimeProbe,
    SystemClock,
};
use std::sync::Arc;
use std::time::Instant;

/// Optional capabilities, detected once by the caller and injected.
pub struct CapabilitySet {
    pub images: Box<dyn ImageDecoder>,
    pub browser: Box<dyn BrowserDriver>,
}

impl CapabilitySet {
    /// Nothing optional: gray image check, no runtime section.
    pub fn none() -> Self {
        Self {
            images: Box::new(crate::image_audit::NullImageDecoder),
            browser: Box::new(NullBrowserDriver),
        }
    }

    /// Whatever this build offers. The browser is only wired in when the
    /// `chrome` feature is compiled and probing is enabled.
    pub fn detect(cfg: &ValidatorConfig) -> Self {
        Self {
            images: default_decoder(),
            browser: default_browser(cfg),
        }
    }

    pub fn summary(&self) -> Capabilities {
        Capabilities {
            browser: self.browser.is_available(),
            images: self.images.is_available(),
        }
    }
}

#[cfg(feature = "chrome")]
fn default_browser(cfg: &ValidatorConfig) -> Box<dyn BrowserDriver> {
    if cfg.probe.enabled {
        Box::new(crate::runtime::ChromeDriver::from_config(&cfg.probe))
    } else {
        Box::new(NullBrowserDriver)
    }
}

#[cfg(not(feature = "chrome"))]
fn default_browser(_cfg: &ValidatorConfig) -> Box<dyn BrowserDriver> {
    Box::new(NullBrowserDriver)
}

/// Runs one archive through inspection, static checks, the optional runtime
/// probe and assembly.
pub struct CreativeValidator {
    cfg: ValidatorConfig,
    caps: CapabilitySet,
    clock: Arc<dyn Clock>,
}

impl CreativeValidator {
    pub fn new(cfg: ValidatorConfig, caps: CapabilitySet) -> Self {
        Self {
            cfg,
            caps,
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.cfg
    }

    /// Only an unreadable archive (or an unwritable workspace) fails the run;
    /// every other problem degrades into a gray check or a metadata warning.
    pub fn analyze(
        &self,
        bytes: &[u8],
        original_name: &str,
        workspace: &RunWorkspace,
    ) -> CoreResult<Report> {
        let started = Instant::now();
        let ctx = LogContext::new(&workspace.run_id);
        let capabilities = self.caps.summary();
        log::info!(
            "{} RUN_START name={:?} bytes={} browser={} images={}",
            ctx,
            original_name,
            bytes.len(),
            capabilities.browser,
            capabilities.images
        );

        let archive_sha256 = sha256_hex(bytes);
        let inspected = ArchiveInspector::new(self.cfg.max_zip_bytes)
            .with_entry_limit(self.cfg.max_entry_bytes)
            .inspect(bytes, &workspace.extract_dir(), &ctx.with_phase("archive"))
            .map_err(|e| {
                log::error!("{} RUN_FAILED err={}", ctx, e);
                e
            })?;

        let scanner = PolicyScanner::new(&self.cfg)?;
        let (findings, images) = self.static_checks(&scanner, &inspected, &ctx)?;

        let mut warnings = Vec::new();
        note_skips(&mut warnings, "extract", &inspected.skipped);
        note_skips(&mut warnings, "text", &findings.skipped);
        note_skips(&mut warnings, "image", &images.skipped);
        if !capabilities.images {
            warnings.push("image decoding unavailable".to_string());
        }

        let probe = self.probe(&inspected, workspace, &ctx, &mut warnings);

        let mut check_groups = vec![
            inspected.checks.clone(),
            findings.hygiene,
            vec![images.check],
            findings.content,
        ];
        let (runtime, thumbnails) = match probe {
            Some(outcome) => {
                let (runtime_checks, network_checks) = derive_checks(&outcome.metrics, &self.cfg);
                check_groups.push(runtime_checks);
                check_groups.push(network_checks);
                warnings.extend(outcome.warnings);
                (Some(outcome.metrics), outcome.thumbnails)
            }
            None => (None, Vec::new()),
        };

        let user_agent = if capabilities.browser {
            self.caps.browser.name().to_string()
        } else {
            "n/a".to_string()
        };
        let descriptor = ScanDescriptor {
            run_id: workspace.run_id.clone(),
            original_name: original_name.to_string(),
            archive_sha256,
            user_agent,
            capabilities,
        };
        let report = ReportAssembler::new(descriptor).assemble(
            ReportParts {
                check_groups,
                archive: inspected.entries,
                runtime,
                thumbnails,
                warnings,
            },
            started.elapsed(),
        )?;

        log::info!(
            "{} RUN_DONE checks={} worst={} duration_s={}",
            ctx,
            report.results.len(),
            report.worst_status().as_str(),
            report.metadata.scan_duration
        );
        Ok(report)
    }

    // Policy scan and image audit read the same extracted tree concurrently.
    fn static_checks(
        &self,
        scanner: &PolicyScanner,
        inspected: &InspectedArchive,
        ctx: &LogContext,
    ) -> CoreResult<(PolicyFindings, ImageAudit)> {
        let auditor = ImageAuditor::new(self.caps.images.as_ref(), self.cfg.max_image_side);
        let policy_ctx = ctx.with_phase("policy");
        let image_ctx = ctx.with_phase("images");
        std::thread::scope(|s| {
            let policy = s.spawn(|| scanner.scan(inspected, &policy_ctx));
            let images = auditor.audit(inspected, &image_ctx);
            let findings = policy
                .join()
                .map_err(|_| CoreError::InvalidInput("policy scan panicked".to_string()))?;
            Ok((findings, images))
        })
    }

    fn probe(
        &self,
        inspected: &InspectedArchive,
        workspace: &RunWorkspace,
        ctx: &LogContext,
        warnings: &mut Vec<String>,
    ) -> Option<ProbeOutcome> {
        if !self.cfg.probe.enabled {
            log::info!("{} PROBE_SKIPPED reason=disabled", ctx);
            return None;
        }
        if !self.caps.browser.is_available() {
            log::info!("{} CAPABILITY_UNAVAILABLE capability=browser", ctx);
            warnings.push("browser automation unavailable; runtime checks omitted".to_string());
            return None;
        }
        if !inspected.has_root_index() || inspected.local_path("index.html").is_none() {
            log::info!("{} PROBE_SKIPPED reason=no_root_index", ctx);
            warnings.push("no root index.html; runtime checks omitted".to_string());
            return None;
        }

        let probe = RuntimeProbe::new(
            self.caps.browser.as_ref(),
            &self.cfg.probe,
            Arc::clone(&self.clock),
            ctx,
        );
        match probe.run(&workspace.entry_document(), &workspace.root) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::warn!("{} PROBE_UNAVAILABLE err={}", ctx, e);
                warnings.push(format!("runtime checks omitted: {}", e));
                None
            }
        }
    }
}

fn note_skips(warnings: &mut Vec<String>, what: &str, skipped: &[Skip]) {
    for s in skipped {
        warnings.push(format!("{} skipped {}: {}", what, s.name, s.reason));
    }
}
