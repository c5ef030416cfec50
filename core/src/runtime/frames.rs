use crate::error::{CoreError, CoreResult};
use crate::logging::LogContext;
use crate::report::Thumbnail;
use crate::run::backup_file_name;
use crate::runtime::clock::Clock;
use crate::runtime::session::BrowserSession;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use std::time::Duration;

/// Capture offsets, in seconds from the start of frame capture.
pub const FRAME_OFFSETS_SEC: [f64; 6] = [1.4, 3.4, 5.4, 7.4, 9.4, 11.4];

/// Time left until `offset_sec`; zero once it has passed.
pub fn residual_wait(offset_sec: f64, elapsed: Duration) -> Duration {
    Duration::from_millis((offset_sec * 1000.0).round() as u64).saturating_sub(elapsed)
}

pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Captures one screenshot per offset into `out_dir`. A failed capture leaves
/// a gap and a warning; later offsets are still attempted.
pub fn capture_frames(
    session: &mut dyn BrowserSession,
    clock: &dyn Clock,
    out_dir: &Path,
    timeout: Duration,
    warnings: &mut Vec<String>,
    ctx: &LogContext,
) -> Vec<Thumbnail> {
    let start = clock.now();
    let mut thumbs = Vec::with_capacity(FRAME_OFFSETS_SEC.len());
    for t_sec in FRAME_OFFSETS_SEC {
        let wait = residual_wait(t_sec, clock.now().saturating_sub(start));
        if !wait.is_zero() {
            clock.sleep(wait);
        }
        match capture_one(session, out_dir, t_sec, timeout) {
            Ok(thumb) => thumbs.push(thumb),
            Err(e) => {
                log::warn!("{} FRAME_FAILED t_sec={} err={}", ctx, t_sec, e);
                warnings.push(format!("screenshot at {}s: {}", t_sec, e));
            }
        }
    }
    thumbs
}

fn capture_one(
    session: &mut dyn BrowserSession,
    out_dir: &Path,
    t_sec: f64,
    timeout: Duration,
) -> CoreResult<Thumbnail> {
    let png = session.capture_png(timeout)?;
    if png.is_empty() {
        return Err(CoreError::ProbeStepFailure("empty screenshot".to_string()));
    }
    let file = backup_file_name(t_sec);
    std::fs::write(out_dir.join(&file), &png)?;
    Ok(Thumbnail {
        t_sec,
        png_b64: png_data_uri(&png),
        file,
        png,
    })
}
