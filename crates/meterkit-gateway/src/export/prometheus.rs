//! Prometheus text exposition (format 0.0.4) of a collected snapshot.
//!
//! Names are sanitized (`.` and other invalid characters become `_`),
//! monotonic sums get a `_total` suffix, histogram buckets are rendered
//! cumulatively and the resource is exposed as a `target_info` gauge.

use std::fmt::Write;

use meterkit_core::{
    AttributeSet, DataPoint, HistogramDataPoint, Metric, MetricData, ResourceMetrics, Scope,
};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Map an OTel name onto the Prometheus charset `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect();
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn label_key(key: &str) -> String {
    sanitize_name(key).replace(':', "_")
}

fn label_str(scope: &Scope, attrs: &AttributeSet, le: Option<String>) -> String {
    let mut labels = vec![format!("otel_scope_name=\"{}\"", escape_label(&scope.name))];
    labels.extend(attrs.iter().map(|kv| {
        format!(
            "{}=\"{}\"",
            label_key(&kv.key),
            escape_label(&kv.value.to_string())
        )
    }));
    if let Some(le) = le {
        labels.push(format!("le=\"{le}\""));
    }
    labels.join(",")
}

fn fmt_f64(v: f64) -> String {
    if v.is_infinite() {
        if v > 0.0 { "+Inf".into() } else { "-Inf".into() }
    } else {
        v.to_string()
    }
}

/// Streams sharing one exposed name, possibly from several scopes.
struct Family<'a> {
    name: String,
    kind: &'static str,
    help: &'a str,
    members: Vec<(&'a Scope, &'a MetricData)>,
}

fn exposed_name(metric: &Metric) -> (String, &'static str) {
    let base = sanitize_name(&metric.name);
    match &metric.data {
        MetricData::Sum { monotonic: true, .. } if base.ends_with("_total") => (base, "counter"),
        MetricData::Sum { monotonic: true, .. } => (format!("{base}_total"), "counter"),
        MetricData::Sum { .. } | MetricData::Gauge { .. } => (base, "gauge"),
        MetricData::Histogram { .. } => (base, "histogram"),
    }
}

/// Group streams by exposed name so each family gets a single HELP/TYPE
/// header; the scope label keeps the series apart.
fn families(rm: &ResourceMetrics) -> Vec<Family<'_>> {
    let mut out: Vec<Family<'_>> = Vec::new();
    for sm in &rm.scope_metrics {
        for metric in &sm.metrics {
            let (name, kind) = exposed_name(metric);
            match out.iter_mut().find(|f| f.name == name) {
                Some(f) if f.kind == kind => {
                    if f.help.is_empty() {
                        f.help = metric.description.as_str();
                    }
                    f.members.push((&sm.scope, &metric.data));
                }
                Some(f) => tracing::warn!(
                    metric = %name,
                    scope = %sm.scope.name,
                    kind,
                    existing = f.kind,
                    "type conflict in exposition, stream skipped"
                ),
                None => out.push(Family {
                    name,
                    kind,
                    help: metric.description.as_str(),
                    members: vec![(&sm.scope, &metric.data)],
                }),
            }
        }
    }
    out
}

pub fn render(rm: &ResourceMetrics) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# HELP target_info Target metadata");
    let _ = writeln!(out, "# TYPE target_info gauge");
    let labels = rm
        .resource
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", label_key(k), escape_label(&v.to_string())))
        .collect::<Vec<_>>()
        .join(",");
    let _ = writeln!(out, "target_info{{{labels}}} 1");

    for family in families(rm) {
        render_family(&family, &mut out);
    }
    out
}

fn render_family(family: &Family<'_>, out: &mut String) {
    let name = &family.name;
    if !family.help.is_empty() {
        let _ = writeln!(out, "# HELP {name} {}", escape_help(family.help));
    }
    let _ = writeln!(out, "# TYPE {name} {}", family.kind);

    for (scope, data) in &family.members {
        match data {
            MetricData::Sum { points, .. } | MetricData::Gauge { points } => {
                for p in points {
                    render_point(scope, name, p, out);
                }
            }
            MetricData::Histogram { points, .. } => {
                for p in points {
                    render_histogram(scope, name, p, out);
                }
            }
        }
    }
}

fn render_point(scope: &Scope, name: &str, p: &DataPoint, out: &mut String) {
    let labels = label_str(scope, &p.attributes, None);
    let _ = writeln!(out, "{name}{{{labels}}} {}", p.value);
}

fn render_histogram(scope: &Scope, name: &str, p: &HistogramDataPoint, out: &mut String) {
    // stored counts are per bucket; exposition wants cumulative `le` counts
    let mut cumulative = 0u64;
    for (bound, count) in p.bounds.iter().zip(&p.bucket_counts) {
        cumulative = cumulative.saturating_add(*count);
        let labels = label_str(scope, &p.attributes, Some(fmt_f64(*bound)));
        let _ = writeln!(out, "{name}_bucket{{{labels}}} {cumulative}");
    }
    let labels = label_str(scope, &p.attributes, Some("+Inf".into()));
    let _ = writeln!(out, "{name}_bucket{{{labels}}} {}", p.count);

    let labels = label_str(scope, &p.attributes, None);
    let _ = writeln!(out, "{name}_sum{{{labels}}} {}", p.sum);
    let _ = writeln!(out, "{name}_count{{{labels}}} {}", p.count);
}
