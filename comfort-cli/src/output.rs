use std::fmt::Write;

use comfort_core::{ComfortReport, Metrics};

pub fn render(report: &ComfortReport, place: Option<&str>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Date:     {}", pretty_date(&report.date));
    match place {
        Some(name) => {
            let _ = writeln!(out, "Location: {name} ({:.4}, {:.4})", report.lat, report.lon);
        }
        None => {
            let _ = writeln!(out, "Location: {:.4}, {:.4}", report.lat, report.lon);
        }
    }

    if report.no_data {
        let _ = writeln!(out, "\nNo weather data available for this day and place.");
        return out;
    }

    let _ = writeln!(out, "Source:   {}", report.source);
    let _ = writeln!(out, "Verdict:  {}", report.primary_category().description());
    let _ = writeln!(out, "\nConditions:");
    for category in &report.categories {
        let _ = writeln!(out, "  - {}", category.description());
    }

    let _ = writeln!(out, "\nMetrics:");
    for (label, value) in metric_lines(&report.metrics) {
        let _ = writeln!(out, "  {label:<12} {value}");
    }

    out
}

fn metric_lines(m: &Metrics) -> Vec<(&'static str, String)> {
    let fmt = |v: Option<f64>, unit: &str| match v {
        Some(v) => format!("{v:.1} {unit}"),
        None => "n/a".to_string(),
    };

    let mut lines = vec![
        ("Temperature", fmt(m.temp_c, "°C")),
        ("Humidity", fmt(m.humidity, "%")),
        ("Precip", fmt(m.precip_mm, "mm")),
        ("Wind", fmt(m.wind_kmh, "km/h")),
    ];
    if m.heat_index_c.is_some() {
        lines.push(("Heat index", fmt(m.heat_index_c, "°C")));
    }
    lines
}

/// `20230901` -> `2023-09-01`; anything else is shown as-is.
fn pretty_date(key: &str) -> String {
    if key.len() == 8 && key.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &key[..4], &key[4..6], &key[6..])
    } else {
        key.to_string()
    }
}
