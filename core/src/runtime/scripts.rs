//! In-page evaluation scripts. Each takes no input and returns a JSON-encoded
//! string (or a bare number) that the matching `parse_*` function turns into a
//! typed value. Parsers never fail; unusable payloads map to `None`.

use crate::report::Dimensions;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageScript {
    pub name: &'static str,
    pub version: u32,
    pub source: &'static str,
    pub awaits_promise: bool,
}

impl PageScript {
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Bounding box of the root visual element, falling back to 300x250.
pub const ROOT_DIMENSIONS: PageScript = PageScript {
    name: "root_dimensions",
    version: 1,
    source: r#"(() => {
  const el = document.body || document.documentElement;
  const r = el ? el.getBoundingClientRect() : null;
  return JSON.stringify({
    width: Math.round((r && r.width) || 300),
    height: Math.round((r && r.height) || 250)
  });
})()"#,
    awaits_promise: false,
};

/// Navigation timing `responseEnd`, or null.
pub const VISUAL_START: PageScript = PageScript {
    name: "visual_start",
    version: 1,
    source: r#"(() => {
  const nav = performance.getEntriesByType('navigation')[0];
  return JSON.stringify(nav && nav.responseEnd ? Math.round(nav.responseEnd) : null);
})()"#,
    awaits_promise: false,
};

/// Computed animation duration/iteration-count strings for every animated element.
pub const ANIMATION_STYLES: PageScript = PageScript {
    name: "animation_styles",
    version: 1,
    source: r#"(() => {
  const out = [];
  for (const el of document.querySelectorAll('*')) {
    const cs = getComputedStyle(el);
    const d = cs.animationDuration || '';
    const i = cs.animationIterationCount || '';
    if ((d === '' || d === '0s') && i.indexOf('infinite') < 0) continue;
    out.push({ duration: d, iterations: i });
  }
  return JSON.stringify(out);
})()"#,
    awaits_promise: false,
};

pub const CPU_WINDOW_MS: u64 = 5000;
pub const FRAME_BUDGET_MS: f64 = 16.7;

/// Busy time over a 5000 ms animation-frame window: per-frame excess over 16.7 ms.
pub const CPU_BUSY: PageScript = PageScript {
    name: "cpu_busy",
    version: 1,
    source: r#"(async () => {
  const start = performance.now();
  let busy = 0, last = start;
  while (performance.now() - start < 5000) {
    const t = performance.now();
    const dt = t - last;
    last = t;
    if (dt > 16.7) busy += dt - 16.7;
    await new Promise(r => requestAnimationFrame(() => r()));
  }
  return JSON.stringify(Math.round(busy));
})()"#,
    awaits_promise: true,
};

pub const JS_HEAP: PageScript = PageScript {
    name: "js_heap",
    version: 1,
    source: r#"(() => JSON.stringify(Math.round(((performance.memory && performance.memory.usedJSHeapSize) || 0) / 1024)))()"#,
    awaits_promise: false,
};

/// Scripts return JSON text; backends may hand it back as a string or already decoded.
fn payload(v: Value) -> Value {
    match v {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

fn as_non_negative(v: &Value) -> Option<u64> {
    let f = v.as_f64()?;
    if f.is_finite() && f >= 0.0 {
        Some(f.round() as u64)
    } else {
        None
    }
}

pub fn parse_dimensions(v: Value) -> Option<Dimensions> {
    let v = payload(v);
    let width = as_non_negative(v.get("width")?)?;
    let height = as_non_negative(v.get("height")?)?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Dimensions {
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
    })
}

pub fn parse_visual_start(v: Value) -> Option<u64> {
    as_non_negative(&payload(v))
}

pub fn parse_cpu_busy(v: Value) -> Option<u64> {
    as_non_negative(&payload(v))
}

pub fn parse_heap_kb(v: Value) -> u64 {
    as_non_negative(&payload(v)).unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnimationSample {
    pub duration: String,
    pub iterations: String,
}

pub fn parse_animation(v: Value) -> Option<i64> {
    let samples: Vec<AnimationSample> = serde_json::from_value(payload(v)).ok()?;
    Some(max_animation_ms(&samples))
}

/// Longest finite `duration x iterations` across samples, or `-1` as soon as
/// any sample repeats infinitely.
pub fn max_animation_ms(samples: &[AnimationSample]) -> i64 {
    let mut max_ms = 0.0f64;
    for s in samples {
        let Some(iterations) = iteration_factor(&s.iterations) else {
            return -1;
        };
        let total = max_duration_ms(&s.duration) * iterations;
        if total > max_ms {
            max_ms = total;
        }
    }
    max_ms.round() as i64
}

/// `"1.5s"` -> 1500, `"200ms"` -> 200, anything else -> 0.
pub fn css_time_ms(s: &str) -> f64 {
    let s = s.trim();
    let parsed = if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<f64>().ok()
    } else if let Some(sec) = s.strip_suffix('s') {
        sec.trim().parse::<f64>().ok().map(|v| v * 1000.0)
    } else {
        None
    };
    parsed.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0)
}

fn max_duration_ms(list: &str) -> f64 {
    list.split(',').map(css_time_ms).fold(0.0, f64::max)
}

// None means infinite. Unparseable or zero counts are treated as 1.
fn iteration_factor(list: &str) -> Option<f64> {
    let mut max_it = 0.0f64;
    let mut any = false;
    for part in list.split(',') {
        let part = part.trim();
        if part == "infinite" {
            return None;
        }
        let v = part
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(1.0);
        max_it = max_it.max(v);
        any = true;
    }
    Some(if any { max_it } else { 1.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(d: &str, i: &str) -> AnimationSample {
        AnimationSample {
            duration: d.to_string(),
            iterations: i.to_string(),
        }
    }

    #[test]
    fn css_times() {
        assert_eq!(css_time_ms("1.5s"), 1500.0);
        assert_eq!(css_time_ms(" 200ms"), 200.0);
        assert_eq!(css_time_ms("0s"), 0.0);
        assert_eq!(css_time_ms("auto"), 0.0);
    }

    #[test]
    fn animation_takes_longest_finite_total() {
        let samples = vec![sample("2s", "3"), sample("500ms, 4s", "1, 2"), sample("1s", "0")];
        assert_eq!(max_animation_ms(&samples), 8000);
    }

    #[test]
    fn any_infinite_iteration_yields_sentinel() {
        let samples = vec![
            sample("2s", "3"),
            sample("1s", "1, infinite"),
            sample("60s", "100"),
        ];
        assert_eq!(max_animation_ms(&samples), -1);
        assert_eq!(max_animation_ms(&[sample("0s", "infinite")]), -1);
    }

    #[test]
    fn no_animations_is_zero() {
        assert_eq!(max_animation_ms(&[]), 0);
        assert_eq!(parse_animation(json!("[]")), Some(0));
    }

    #[test]
    fn parsers_accept_json_text_or_values() {
        assert_eq!(
            parse_dimensions(json!("{\"width\":300,\"height\":600}")),
            Some(Dimensions {
                width: 300,
                height: 600
            })
        );
        assert_eq!(
            parse_dimensions(json!({"width": 728.4, "height": 90})),
            Some(Dimensions {
                width: 728,
                height: 90
            })
        );
        assert_eq!(parse_dimensions(json!(null)), None);
        assert_eq!(parse_visual_start(json!("null")), None);
        assert_eq!(parse_visual_start(json!("412")), Some(412));
        assert_eq!(parse_cpu_busy(json!(37)), Some(37));
        assert_eq!(parse_heap_kb(json!("oops")), 0);
        assert_eq!(
            parse_animation(json!("[{\"duration\":\"1s\",\"iterations\":\"infinite\"}]")),
            Some(-1)
        );
    }

    #[test]
    fn script_ids_are_versioned() {
        assert_eq!(ROOT_DIMENSIONS.id(), "root_dimensions@1");
        assert!(CPU_BUSY.awaits_promise);
        assert!(!JS_HEAP.awaits_promise);
    }
}
