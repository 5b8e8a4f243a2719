/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use recon_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Half-ULP nudge so exact midpoints round away from zero.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();
    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        // "0.50" → ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && rounded != 0.0 {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a yen amount with thousands separators and no decimals.
///
/// # Examples
///
/// ```
/// use recon_core::formatting::format_yen;
///
/// assert_eq!(format_yen(1234567.0), "¥1,234,567");
/// assert_eq!(format_yen(0.0), "¥0");
/// assert_eq!(format_yen(-500.0), "-¥500");
/// ```
pub fn format_yen(amount: f64) -> String {
    if amount < 0.0 && format_number(amount, 0) != "0" {
        format!("-¥{}", format_number(amount.abs(), 0))
    } else {
        format!("¥{}", format_number(amount.abs(), 0))
    }
}

/// Format a percentage with one decimal place, e.g. `"12.5%"`.
pub fn format_rate(rate: f64) -> String {
    format!("{}%", format_number(rate, 1))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
