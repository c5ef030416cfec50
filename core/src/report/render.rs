use crate::report::model::{Category, Report};

const CATEGORIES: [Category; 4] = [
    Category::Archive,
    Category::Policy,
    Category::Runtime,
    Category::Network,
];

pub fn render_text(report: &Report) -> String {
    let m = &report.metadata;
    let mut out = String::new();
    out.push_str(&format!("Creative: {} ({})\n", m.original_name, m.run_id));
    out.push_str(&format!("SHA-256: {}\n", m.archive_sha256));
    out.push_str(&format!(
        "Overall: {}  Duration: {:.2}s\n",
        report.worst_status().as_str(),
        m.scan_duration
    ));

    for cat in CATEGORIES {
        let checks: Vec<_> = report.results.iter().filter(|c| c.category == cat).collect();
        if checks.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{:?}\n", cat));
        for c in checks {
            out.push_str(&format!(
                "  [{:<6}] {:<28} {}",
                c.status.as_str(),
                c.label,
                c.value
            ));
            if !c.help.is_empty() {
                out.push_str(&format!("  ({})", c.help));
            }
            out.push('\n');
        }
    }

    if !report.thumbnails.is_empty() {
        let offsets: Vec<String> = report
            .thumbnails
            .iter()
            .map(|t| format!("{}s", t.t_sec))
            .collect();
        out.push_str(&format!("\nThumbnails: {}\n", offsets.join(", ")));
    }

    if !m.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &m.warnings {
            out.push_str(&format!("  - {}\n", w));
        }
    }
    out
}
