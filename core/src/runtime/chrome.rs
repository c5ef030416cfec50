use crate::config::ProbeConfig;
use crate::error::{CoreError, CoreResult};
use crate::report::{Dimensions, NetworkRequestRecord};
use crate::runtime::deadline::run_with_timeout;
use crate::runtime::scripts::PageScript;
use crate::runtime::session::{BrowserDriver, BrowserSession, LaunchSettings};
use crate::runtime::telemetry::{ConsoleLevel, TelemetrySink};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::protocol::cdp::Network::events::ResponseReceivedEventParams;
use headless_chrome::protocol::cdp::Network::GetResponseBodyReturnObject;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(90);
const DCL_POLL: Duration = Duration::from_millis(5);
const RESPONSE_HANDLER: &str = "adzip-telemetry";

/// Local Chrome/Chromium driven over the DevTools protocol.
pub struct ChromeDriver {
    chrome_path: Option<PathBuf>,
}

impl ChromeDriver {
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self { chrome_path }
    }

    pub fn from_config(cfg: &ProbeConfig) -> Self {
        Self::new(cfg.chrome_path.clone())
    }
}

impl BrowserDriver for ChromeDriver {
    fn name(&self) -> &str {
        "headless_chrome"
    }

    fn is_available(&self) -> bool {
        match &self.chrome_path {
            Some(p) => p.is_file(),
            None => headless_chrome::browser::default_executable().is_ok(),
        }
    }

    fn launch(&self, settings: LaunchSettings) -> CoreResult<Box<dyn BrowserSession>> {
        let path = settings.chrome_path.clone().or_else(|| self.chrome_path.clone());
        let opts = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(settings.sandbox)
            .window_size(Some((settings.window.width, settings.window.height)))
            .path(path)
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| CoreError::CapabilityUnavailable(e.to_string()))?;
        let browser = Browser::new(opts).map_err(unavailable)?;
        let tab = browser.new_tab().map_err(unavailable)?;
        Ok(Box::new(ChromeSession {
            _browser: browser,
            tab,
            telemetry: settings.telemetry,
            dcl_fired: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct ChromeSession {
    // Dropping the browser terminates the process.
    _browser: Browser,
    tab: Arc<Tab>,
    telemetry: TelemetrySink,
    dcl_fired: Arc<AtomicBool>,
}

impl BrowserSession for ChromeSession {
    fn install_listeners(&mut self) -> CoreResult<()> {
        self.tab.enable_runtime().map_err(step_failure)?;

        let sink = self.telemetry.clone();
        let dcl = Arc::clone(&self.dcl_fired);
        self.tab
            .add_event_listener(Arc::new(move |event: &Event| match event {
                Event::PageLifecycleEvent(ev) => {
                    if ev.params.name == "DOMContentLoaded" {
                        dcl.store(true, Ordering::SeqCst);
                    }
                }
                Event::RuntimeConsoleAPICalled(ev) => {
                    let kind = format!("{:?}", ev.params.Type);
                    sink.console(ConsoleLevel::from_type_name(&kind));
                }
                _ => {}
            }))
            .map_err(step_failure)?;

        // Handlers run on Network.loadingFinished, so the body is complete
        // when fetched.
        let sink = self.telemetry.clone();
        self.tab
            .register_response_handling(
                RESPONSE_HANDLER,
                Box::new(
                    move |params: ResponseReceivedEventParams,
                          fetch_body: &dyn Fn() -> anyhow::Result<GetResponseBodyReturnObject>| {
                        sink.request(request_record(&params, fetch_body));
                    },
                ),
            )
            .map_err(step_failure)?;
        Ok(())
    }

    fn navigate(&mut self, url: &str, timeout: Duration) -> CoreResult<()> {
        let started = Instant::now();
        self.dcl_fired.store(false, Ordering::SeqCst);
        let tab = Arc::clone(&self.tab);
        let target = url.to_string();
        run_with_timeout("navigate", timeout, move || {
            tab.navigate_to(&target).map(|_| ()).map_err(step_failure)
        })?;

        while !self.dcl_fired.load(Ordering::SeqCst) {
            if started.elapsed() >= timeout {
                return Err(CoreError::Timeout(format!(
                    "DOMContentLoaded not seen within {} ms",
                    timeout.as_millis()
                )));
            }
            std::thread::sleep(DCL_POLL);
        }
        Ok(())
    }

    fn evaluate(&mut self, script: &PageScript, timeout: Duration) -> CoreResult<Value> {
        let tab = Arc::clone(&self.tab);
        let source = script.source;
        let awaits = script.awaits_promise;
        let id = script.id();
        let obj = run_with_timeout(&id, timeout, move || {
            tab.evaluate(source, awaits).map_err(step_failure)
        })?;
        Ok(obj.value.unwrap_or(Value::Null))
    }

    // Overrides the page viewport itself; the window size only bounds it.
    fn set_viewport(&mut self, dims: Dimensions) -> CoreResult<()> {
        self.tab
            .call_method(viewport_override(dims))
            .map(|_| ())
            .map_err(step_failure)
    }

    fn capture_png(&mut self, timeout: Duration) -> CoreResult<Vec<u8>> {
        let tab = Arc::clone(&self.tab);
        run_with_timeout("screenshot", timeout, move || {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(step_failure)
        })
    }

    fn close(self: Box<Self>) {
        let _ = self.tab.close(false);
    }
}

fn viewport_override(dims: Dimensions) -> Emulation::SetDeviceMetricsOverride {
    Emulation::SetDeviceMetricsOverride {
        width: dims.width,
        height: dims.height,
        device_scale_factor: 1.0,
        mobile: false,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    }
}

fn request_record(
    params: &ResponseReceivedEventParams,
    fetch_body: &dyn Fn() -> anyhow::Result<GetResponseBodyReturnObject>,
) -> NetworkRequestRecord {
    let resp = &params.response;
    let headers = lowercase_headers(resp.headers.0.as_ref());
    let bytes = headers
        .get("content-length")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .or_else(|| fetch_body().ok().map(|b| body_len(&b)));
    let content_type = headers
        .get("content-type")
        .cloned()
        .or_else(|| (!resp.mime_type.is_empty()).then(|| resp.mime_type.clone()));
    NetworkRequestRecord {
        url: resp.url.clone(),
        status: Some(resp.status as u32),
        protocol: resp.protocol.clone(),
        enc: headers.get("content-encoding").cloned(),
        bytes,
        content_type,
    }
}

fn lowercase_headers(v: Option<&Value>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(Value::Object(map)) = v {
        for (k, v) in map {
            if let Some(s) = v.as_str() {
                out.insert(k.to_ascii_lowercase(), s.to_string());
            }
        }
    }
    out
}

fn body_len(b: &GetResponseBodyReturnObject) -> u64 {
    if b.base_64_encoded {
        STANDARD
            .decode(b.body.as_bytes())
            .map(|d| d.len() as u64)
            .unwrap_or(b.body.len() as u64 * 3 / 4)
    } else {
        b.body.len() as u64
    }
}

fn unavailable(e: anyhow::Error) -> CoreError {
    CoreError::CapabilityUnavailable(e.to_string())
}

fn step_failure(e: anyhow::Error) -> CoreError {
    CoreError::ProbeStepFailure(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_override_matches_creative_size() {
        let v = serde_json::to_value(viewport_override(Dimensions {
            width: 728,
            height: 90,
        }))
        .unwrap();
        assert_eq!(v["width"], 728);
        assert_eq!(v["height"], 90);
        assert_eq!(v["deviceScaleFactor"], 1.0);
        assert_eq!(v["mobile"], false);
        assert!(v.get("screenOrientation").is_none());
    }
}
