use crate::config::ValidatorConfig;
use crate::report::{human_bytes, Category, Check, NetworkRequestRecord, RuntimeMetrics, Status};
use url::Url;

/// Runtime-category checks followed by Network-category checks.
pub fn derive_checks(m: &RuntimeMetrics, cfg: &ValidatorConfig) -> (Vec<Check>, Vec<Check>) {
    let runtime = vec![
        dcl_check(m.dom_content_loaded_ms, cfg.dcl_ms_good),
        visual_check(m.time_to_visual_start_ms, cfg.visual_ms_good),
        count_check("js_errors", "Console Errors", m.console_errors, Status::Red),
        count_check(
            "console_warnings",
            "Console Warnings",
            m.console_warnings,
            Status::Gray,
        ),
        animation_check(m.animation_duration_ms, cfg.animation_max_ms),
        Check::new(
            "dimensions",
            Category::Runtime,
            "Dimensions",
            Status::Green,
            &format!("{}x{}", m.dimensions.width, m.dimensions.height),
        ),
    ];

    let known_bytes: u64 = m.network_requests.iter().filter_map(|r| r.bytes).sum();
    let all_secure = m.network_requests.iter().all(is_secure_or_local);
    // Dropped records make counts and sizes lower bounds, and an unseen
    // request may be insecure.
    let complete = m.requests_dropped == 0;
    let incomplete = format!("incomplete: {} requests not recorded", m.requests_dropped);
    let tally = |id: &str, label: &str, value: String| {
        let check = Check::new(id, Category::Network, label, Status::Green, &value);
        if complete {
            check
        } else {
            Check::new(id, Category::Network, label, Status::Yellow, &format!("≥ {}", value))
                .with_help(incomplete.clone())
        }
    };
    let ssl = match (all_secure, complete) {
        (false, _) => {
            Check::new("ssl_compat", Category::Network, "SSL-Compatibility", Status::Yellow, "Mixed")
        }
        (true, true) => {
            Check::new("ssl_compat", Category::Network, "SSL-Compatibility", Status::Green, "Yes")
        }
        (true, false) => {
            Check::new("ssl_compat", Category::Network, "SSL-Compatibility", Status::Gray, "—")
                .with_help(incomplete.clone())
        }
    };
    let network = vec![
        tally(
            "hosted_file_count",
            "Hosted File Count",
            m.network_requests.len().to_string(),
        ),
        tally("hosted_file_size", "Hosted File Size", human_bytes(known_bytes)),
        ssl,
    ];

    (runtime, network)
}

fn dcl_check(ms: Option<u64>, good: u64) -> Check {
    let (id, label) = ("dom_content_loaded", "DOMContentLoaded");
    let help = format!("< {} ms ideal", good);
    match ms {
        Some(ms) => {
            let status = if ms < good { Status::Green } else { Status::Yellow };
            Check::new(id, Category::Runtime, label, status, &format!("{} ms", ms)).with_help(help)
        }
        None => Check::new(id, Category::Runtime, label, Status::Gray, "—").with_help(help),
    }
}

fn visual_check(ms: Option<u64>, good: u64) -> Check {
    let (id, label) = ("time_to_visual", "Time to Visual Start");
    let help = format!("< {} ms ideal", good);
    match ms {
        Some(ms) => {
            let status = if ms < good { Status::Green } else { Status::Yellow };
            Check::new(id, Category::Runtime, label, status, &format!("{} ms", ms)).with_help(help)
        }
        None => Check::new(id, Category::Runtime, label, Status::Gray, "—").with_help(help),
    }
}

fn count_check(id: &str, label: &str, n: u64, nonzero: Status) -> Check {
    let status = if n == 0 { Status::Green } else { nonzero };
    Check::new(id, Category::Runtime, label, status, &n.to_string())
}

fn animation_check(ms: Option<i64>, max_ms: u64) -> Check {
    let (id, label) = ("animation_duration", "Animation Duration");
    let help = format!("≤ {} ms ideal", max_ms);
    let check = match ms {
        None => Check::new(id, Category::Runtime, label, Status::Gray, "—"),
        Some(ms) if ms < 0 => Check::new(id, Category::Runtime, label, Status::Yellow, "infinite"),
        Some(ms) => {
            let status = if ms as u64 <= max_ms {
                Status::Green
            } else {
                Status::Yellow
            };
            Check::new(id, Category::Runtime, label, status, &format!("{} ms", ms))
        }
    };
    check.with_help(help)
}

/// Local schemes (`file:`, `data:`, `blob:`, `about:`) never leave the machine.
fn is_secure_or_local(r: &NetworkRequestRecord) -> bool {
    match Url::parse(&r.url) {
        Ok(u) => matches!(u.scheme(), "https" | "wss" | "file" | "data" | "blob" | "about"),
        Err(_) => false,
    }
}
