//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Share of `count` in `total` as tenths of a percent, rounded half up.
/// Returns 0 when `total` is 0.
#[must_use]
pub fn percent_tenths(count: usize, total: usize) -> u64 {
    if total == 0 {
        return 0;
    }
    let count = cast::<usize, u128>(count).unwrap_or(0);
    let total = cast::<usize, u128>(total).unwrap_or(1);
    let tenths = (2000 * count + total) / (2 * total);
    cast::<u128, u64>(tenths).unwrap_or(u64::MAX)
}

/// Render tenths of a percent with exactly one decimal place.
#[must_use]
pub fn format_tenths(tenths: u64) -> String {
    format!("{}.{}", tenths / 10, tenths % 10)
}

/// Convert tenths of a percent to a float percentage for display math.
#[must_use]
pub fn tenths_to_f64(tenths: u64) -> f64 {
    cast::<u64, f64>(tenths).unwrap_or(0.0) / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenths_round_half_up() {
        assert_eq!(percent_tenths(2, 3), 667);
        assert_eq!(percent_tenths(1, 3), 333);
        assert_eq!(percent_tenths(49, 400), 123);
        assert_eq!(percent_tenths(5, 5), 1000);
        assert_eq!(percent_tenths(1, 0), 0);
    }

    #[test]
    fn formatting_keeps_one_decimal() {
        assert_eq!(format_tenths(667), "66.7");
        assert_eq!(format_tenths(1000), "100.0");
        assert_eq!(format_tenths(5), "0.5");
        assert!((tenths_to_f64(333) - 33.3).abs() < 1e-9);
    }
}
