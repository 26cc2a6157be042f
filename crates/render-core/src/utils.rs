//! Number formatting shared by the text-based emitters.

/// Formats `v` with at most four decimals and no trailing zeros.
///
/// Non-finite values are written as `0` so a bad coordinate cannot corrupt the
/// surrounding syntax.
pub fn fmt_num(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    let mut s = format!("{:.4}", v);
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

/// Color channel on the 0–1 scale, formatted with [`fmt_num`].
pub fn fmt_unit(channel: u8) -> String {
    fmt_num(channel as f64 / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(1.0), "1");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(-0.00001), "0");
        assert_eq!(fmt_num(12.34567), "12.3457");
        assert_eq!(fmt_num(f64::NAN), "0");
        assert_eq!(fmt_num(100.0), "100");
    }

    #[test]
    fn test_fmt_unit() {
        assert_eq!(fmt_unit(255), "1");
        assert_eq!(fmt_unit(0), "0");
        assert_eq!(fmt_unit(51), "0.2");
    }
}
