//! Headless-browser probe: launches the entry document, measures it, and
//! captures a timed frame strip. The browser itself sits behind
//! [`BrowserDriver`] so the pipeline runs (and is tested) without one.

pub mod checks;
#[cfg(feature = "chrome")]
pub mod chrome;
pub mod clock;
pub mod deadline;
pub mod frames;
pub mod probe;
pub mod scripts;
pub mod session;
pub mod state;
pub mod telemetry;

pub use checks::derive_checks;
#[cfg(feature = "chrome")]
pub use chrome::ChromeDriver;
pub use clock::{Clock, ManualClock, SystemClock};
pub use frames::FRAME_OFFSETS_SEC;
pub use probe::{ProbeOutcome, RuntimeProbe};
pub use scripts::PageScript;
pub use session::{BrowserDriver, BrowserSession, LaunchSettings, NullBrowserDriver};
pub use state::{ProbeState, ProbeStateMachine};
pub use telemetry::{telemetry_channel, ConsoleLevel, SessionTelemetry, TelemetrySink};
