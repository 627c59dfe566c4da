use serde_json::Value;

use crate::model::Field;

/// Readings at or below this value are provider sentinels for "missing".
pub const SENTINEL_THRESHOLD: f64 = -900.0;

/// Validate a reading for `field`, returning `None` when it is missing,
/// non-finite, a sentinel, or outside the field's physical range.
///
/// Providers signal a missing observation with large negative numbers
/// (typically `-999`). Everything that reaches the classifier goes through
/// here first.
pub fn sanitize(value: Option<f64>, field: Field) -> Option<f64> {
    let n = value?;
    if !n.is_finite() || n <= SENTINEL_THRESHOLD {
        return None;
    }

    let in_range = match field {
        Field::Humidity => (0.0..=100.0).contains(&n),
        Field::WindKmh | Field::PrecipMm => n >= 0.0,
        Field::TempC | Field::HeatIndexC => true,
    };

    in_range.then_some(n)
}

/// Coerce a JSON number or numeric string into an `f64`.
pub fn coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
