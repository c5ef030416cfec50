const UNITS: [&str; 3] = ["KB", "MB", "GB"];

/// Human-readable byte count: whole bytes below 1 KB, otherwise one decimal.
pub fn human_bytes(n: u64) -> String {
    if n < 1024 {
        return format!("{} B", n);
    }
    let mut v = n as f64 / 1024.0;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", v, UNITS[unit])
}
