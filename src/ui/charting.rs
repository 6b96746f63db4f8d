/// X (test index) and Y (milliseconds) upper bounds for the trend chart.
/// Y gets 10% headroom and is rounded up to a multiple of 50.
pub fn compute_chart_params(points: &[(f64, f64)]) -> (f64, f64) {
    let highest_ms = points.iter().map(|&(_, ms)| ms).fold(0.0, f64::max);
    let last_index = points.last().map(|p| p.0).unwrap_or(1.0).max(1.0);

    let y_max = ((highest_ms * 1.1) / 50.0).ceil() * 50.0;
    (last_index, y_max.max(50.0))
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_chart_params_empty() {
        assert_eq!(compute_chart_params(&[]), (1.0, 50.0));
    }

    #[test]
    fn test_compute_chart_params_headroom() {
        let (x, y) = compute_chart_params(&[(1.0, 180.0), (2.0, 420.0), (3.0, 250.0)]);
        assert_eq!(x, 3.0);
        // 420 * 1.1 = 462 -> 500
        assert_eq!(y, 500.0);
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label(1.0), "1");
        assert_eq!(format_label(1.2345), "1.23");
    }
}
