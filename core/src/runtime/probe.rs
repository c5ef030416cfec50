use crate::config::ProbeConfig;
use crate::error::{CoreError, CoreResult};
use crate::logging::LogContext;
use crate::report::{Dimensions, RuntimeMetrics, Thumbnail};
use crate::runtime::clock::Clock;
use crate::runtime::frames::capture_frames;
use crate::runtime::scripts::{self, PageScript};
use crate::runtime::session::{BrowserDriver, BrowserSession, LaunchSettings};
use crate::runtime::state::{ProbeState, ProbeStateMachine};
use crate::runtime::telemetry::telemetry_channel;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub metrics: RuntimeMetrics,
    pub thumbnails: Vec<Thumbnail>,
    /// Steps that degraded instead of producing a value.
    pub warnings: Vec<String>,
    pub states: Vec<ProbeState>,
}

// Filled step by step so a late failure keeps earlier results.
#[derive(Debug, Default)]
struct Collected {
    dcl_ms: Option<u64>,
    visual_ms: Option<u64>,
    animation_ms: Option<i64>,
    dimensions: Dimensions,
    cpu_busy_ms: Option<u64>,
    heap_kb: u64,
    thumbnails: Vec<Thumbnail>,
    warnings: Vec<String>,
}

/// Drives one browser session against the extracted entry document.
pub struct RuntimeProbe<'a> {
    driver: &'a dyn BrowserDriver,
    cfg: &'a ProbeConfig,
    clock: Arc<dyn Clock>,
    machine: ProbeStateMachine,
    ctx: LogContext,
}

impl<'a> RuntimeProbe<'a> {
    pub fn new(
        driver: &'a dyn BrowserDriver,
        cfg: &'a ProbeConfig,
        clock: Arc<dyn Clock>,
        ctx: &LogContext,
    ) -> Self {
        Self {
            driver,
            cfg,
            clock,
            machine: ProbeStateMachine::new(),
            ctx: ctx.with_phase("probe"),
        }
    }

    pub fn state(&self) -> ProbeState {
        self.machine.state()
    }

    /// Fails only when the browser cannot be launched; every later step
    /// degrades into a warning.
    pub fn run(mut self, entry_document: &Path, frames_dir: &Path) -> CoreResult<ProbeOutcome> {
        self.step(ProbeState::LAUNCHING)?;
        let (sink, collector) = telemetry_channel(self.cfg.telemetry_capacity);
        let settings = LaunchSettings {
            window: Dimensions::default(),
            sandbox: self.cfg.sandbox,
            chrome_path: self.cfg.chrome_path.clone(),
            telemetry: sink,
        };
        let mut session = match self.driver.launch(settings) {
            Ok(s) => s,
            Err(e) => {
                self.step(ProbeState::CLOSED)?;
                log::info!("{} CAPABILITY_UNAVAILABLE capability=browser err={}", self.ctx, e);
                return Err(CoreError::CapabilityUnavailable(format!(
                    "{} launch failed: {}",
                    self.driver.name(),
                    e
                )));
            }
        };

        let mut collected = Collected::default();
        let driven = self.drive(session.as_mut(), entry_document, frames_dir, &mut collected);
        session.close();
        self.step(ProbeState::CLOSED)?;
        if let Err(e) = driven {
            log::error!("{} PROBE_ABORTED err={}", self.ctx, e);
            collected.warnings.push(format!("probe aborted: {}", e));
        }

        let telemetry = collector.drain();
        if telemetry.dropped_requests > 0 {
            collected.warnings.push(format!(
                "{} network requests dropped (capacity {})",
                telemetry.dropped_requests, self.cfg.telemetry_capacity
            ));
        }
        log::info!(
            "{} PROBE_DONE dcl_ms={:?} requests={} errors={} frames={}",
            self.ctx,
            collected.dcl_ms,
            telemetry.requests.len(),
            telemetry.console_errors,
            collected.thumbnails.len()
        );

        Ok(ProbeOutcome {
            metrics: RuntimeMetrics {
                dom_content_loaded_ms: collected.dcl_ms,
                time_to_visual_start_ms: collected.visual_ms,
                console_errors: telemetry.console_errors,
                console_warnings: telemetry.console_warnings,
                animation_duration_ms: collected.animation_ms,
                dimensions: collected.dimensions,
                network_requests: telemetry.requests,
                requests_dropped: telemetry.dropped_requests,
                cpu_busy_ms_5s: collected.cpu_busy_ms,
                js_heap_kb: collected.heap_kb,
            },
            thumbnails: collected.thumbnails,
            warnings: collected.warnings,
            states: self.machine.history().to_vec(),
        })
    }

    fn drive(
        &mut self,
        session: &mut dyn BrowserSession,
        entry_document: &Path,
        frames_dir: &Path,
        out: &mut Collected,
    ) -> CoreResult<()> {
        self.step(ProbeState::NAVIGATING)?;
        if let Err(e) = session.install_listeners() {
            self.degrade(out, "listeners", &e);
        }
        match file_url(entry_document) {
            Ok(url) => {
                let started = self.clock.now();
                match session.navigate(&url, self.cfg.navigation_timeout()) {
                    Ok(()) => {
                        let elapsed = self.clock.now().saturating_sub(started);
                        out.dcl_ms = Some(elapsed.as_millis() as u64);
                    }
                    Err(e) => self.degrade(out, "navigation", &e),
                }
            }
            Err(e) => self.degrade(out, "navigation", &e),
        }

        self.step(ProbeState::MEASURING)?;
        let eval_timeout = self.cfg.evaluation_timeout();
        out.dimensions = self
            .measure(session, &scripts::ROOT_DIMENSIONS, eval_timeout, out)
            .and_then(scripts::parse_dimensions)
            .unwrap_or_default();
        out.visual_ms = self
            .measure(session, &scripts::VISUAL_START, eval_timeout, out)
            .and_then(scripts::parse_visual_start);
        out.animation_ms = self
            .measure(session, &scripts::ANIMATION_STYLES, eval_timeout, out)
            .and_then(scripts::parse_animation);
        out.cpu_busy_ms = self
            .measure(session, &scripts::CPU_BUSY, self.cfg.cpu_window_timeout(), out)
            .and_then(scripts::parse_cpu_busy);
        out.heap_kb = self
            .measure(session, &scripts::JS_HEAP, eval_timeout, out)
            .map(scripts::parse_heap_kb)
            .unwrap_or(0);

        self.step(ProbeState::CAPTURING_FRAMES)?;
        let viewport = Dimensions {
            width: out.dimensions.width.max(1),
            height: out.dimensions.height.max(1),
        };
        if let Err(e) = session.set_viewport(viewport) {
            self.degrade(out, "viewport", &e);
        }
        out.thumbnails = capture_frames(
            session,
            self.clock.as_ref(),
            frames_dir,
            self.cfg.screenshot_timeout(),
            &mut out.warnings,
            &self.ctx,
        );
        Ok(())
    }

    fn measure(
        &self,
        session: &mut dyn BrowserSession,
        script: &PageScript,
        timeout: Duration,
        out: &mut Collected,
    ) -> Option<Value> {
        match session.evaluate(script, timeout) {
            Ok(v) => Some(v),
            Err(e) => {
                self.degrade(out, &script.id(), &e);
                None
            }
        }
    }

    // Either way the step's metric is left empty and the run continues; only
    // the log level differs for failures outside the browser (e.g. local I/O).
    fn degrade(&self, out: &mut Collected, step: &str, e: &CoreError) {
        if e.is_step_degradation() {
            log::warn!("{} STEP_DEGRADED step={} err={}", self.ctx, step, e);
        } else {
            log::error!("{} STEP_FAILED step={} err={}", self.ctx, step, e);
        }
        out.warnings.push(format!("{}: {}", step, e));
    }

    fn step(&mut self, to: ProbeState) -> CoreResult<()> {
        let from = self.machine.state();
        self.machine.transition(to)?;
        log::debug!("{} PROBE_STATE from={:?} to={:?}", self.ctx, from, to);
        Ok(())
    }
}

fn file_url(path: &Path) -> CoreResult<String> {
    let abs = std::fs::canonicalize(path)?;
    Url::from_file_path(&abs)
        .map(|u| u.to_string())
        .map_err(|_| CoreError::ProbeStepFailure(format!("not a file path: {}", abs.display())))
}
