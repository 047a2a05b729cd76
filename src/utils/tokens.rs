//! Token-count formatting for the TUI footer (`Tokens: ↑ <in> ↓ <out>`).

/// Smart-abbreviate a token count: 0-999 as an integer, 1,000-9,999 as
/// `X.Yk`, 10,000-999,999 as `Xk`, 1,000,000-9,999,999 as `X.Ym`, and
/// 10,000,000 and above as `Xm`.
pub fn format_tokens(n: u64) -> String {
    match n {
        0..=999 => n.to_string(),
        1_000..=9_999 => format!("{:.1}k", n as f64 / 1000.0),
        10_000..=999_999 => format!("{}k", n / 1000),
        1_000_000..=9_999_999 => format!("{:.1}m", n as f64 / 1_000_000.0),
        _ => format!("{}m", n / 1_000_000),
    }
}

/// Render the context-usage footer segment: `Context: <used>/<max> (<pct>%)`.
pub fn format_context(used: u64, max: u64) -> String {
    let pct = if max == 0 {
        0
    } else {
        ((used as f64 / max as f64) * 100.0).round() as u64
    };
    format!("Context: {}/{} ({}%)", used, max, pct)
}

/// Render the full token footer line.
pub fn format_footer(input_tokens: u64, output_tokens: u64, context_used: u64, context_max: u64) -> String {
    format!(
        "Tokens: \u{2191} {} \u{2193} {}  Cache: --  {}",
        format_tokens(input_tokens),
        format_tokens(output_tokens),
        format_context(context_used, context_max)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_below_thousand_as_integer() {
        assert_eq!(format_tokens(345), "345");
    }

    #[test]
    fn formats_low_thousands_with_one_decimal() {
        assert_eq!(format_tokens(1900), "1.9k");
    }

    #[test]
    fn formats_high_thousands_without_decimal() {
        assert_eq!(format_tokens(15000), "15k");
    }

    #[test]
    fn formats_millions_with_one_decimal() {
        assert_eq!(format_tokens(1_900_000), "1.9m");
    }

    #[test]
    fn formats_ten_million_and_above_without_decimal() {
        assert_eq!(format_tokens(25_000_000), "25m");
    }

    #[test]
    fn context_footer_computes_percentage() {
        assert_eq!(format_context(5000, 10000), "Context: 5000/10000 (50%)");
    }
}
