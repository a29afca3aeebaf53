/// Renders a price held in minor units as `"1 000 ₽"`.
///
/// Kopecks are truncated, thousands are separated by a plain space.
pub fn format_price(price_minor: i64) -> String {
    let whole = price_minor / 100;
    let digits = whole.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    if whole < 0 {
        format!("-{grouped} ₽")
    } else {
        format!("{grouped} ₽")
    }
}

/// Truncates to at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
