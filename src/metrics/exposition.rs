use crate::metrics::Gauge;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Renders gauges in the Prometheus text exposition format.
pub fn render(gauges: &[&Gauge]) -> String {
    let mut body = String::new();
    for gauge in gauges {
        body.push_str(&format!("# HELP {} {}\n", gauge.name(), gauge.help()));
        body.push_str(&format!("# TYPE {} gauge\n", gauge.name()));
        for (values, value) in gauge.samples() {
            let labels = gauge
                .label_names()
                .iter()
                .zip(values.iter())
                .map(|(name, value)| format!("{name}=\"{}\"", escape_label_value(value)))
                .collect::<Vec<_>>()
                .join(",");
            body.push_str(&format!("{}{{{labels}}} {}\n", gauge.name(), format_value(value)));
        }
    }
    body
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
