use crate::error::{CoreError, CoreResult};
use crate::report::Dimensions;
use crate::runtime::scripts::PageScript;
use crate::runtime::telemetry::TelemetrySink;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub window: Dimensions,
    pub sandbox: bool,
    pub chrome_path: Option<PathBuf>,
    /// Where console and network listeners report.
    pub telemetry: TelemetrySink,
}

/// Browser automation capability.
pub trait BrowserDriver: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Starts an isolated browser instance for one run.
    fn launch(&self, settings: LaunchSettings) -> CoreResult<Box<dyn BrowserSession>>;
}

/// One live page. Every call that can stall takes a deadline and returns
/// `CoreError::Timeout` when it passes.
pub trait BrowserSession {
    /// Starts forwarding console messages and completed requests to telemetry.
    fn install_listeners(&mut self) -> CoreResult<()>;

    /// Loads `url` and returns once DOMContentLoaded has fired.
    fn navigate(&mut self, url: &str, timeout: Duration) -> CoreResult<()>;

    fn evaluate(&mut self, script: &PageScript, timeout: Duration) -> CoreResult<Value>;

    fn set_viewport(&mut self, dims: Dimensions) -> CoreResult<()>;

    fn capture_png(&mut self, timeout: Duration) -> CoreResult<Vec<u8>>;

    /// Terminates the browser. Infallible from the caller's view.
    fn close(self: Box<Self>);
}

/// Never available; the runtime section is omitted from reports.
pub struct NullBrowserDriver;

impl BrowserDriver for NullBrowserDriver {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn launch(&self, _settings: LaunchSettings) -> CoreResult<Box<dyn BrowserSession>> {
        Err(CoreError::CapabilityUnavailable(
            "browser automation not available".to_string(),
        ))
    }
}
