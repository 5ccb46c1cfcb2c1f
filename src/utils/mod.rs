use std::time::Instant;
use tracing::info;

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "⏱  Finished: {} (took {:.2?})",
            self.label,
            self.start.elapsed()
        );
    }
}

/// Format a large integer with thousands separators.
pub fn fmt_number(n: i64) -> String {
    let s = n.abs().to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    if n < 0 {
        result.push('-');
    }
    result.chars().rev().collect()
}

/// Render an amount the way Persian storefronts print it: Persian digits,
/// `٬` group separators, the تومان unit appended.
pub fn fmt_toman(amount: u64) -> String {
    let grouped: String = fmt_number(amount as i64)
        .chars()
        .map(|c| match c {
            '0'..='9' => {
                // U+06F0..U+06F9 are contiguous, like ASCII digits.
                char::from_u32('۰' as u32 + (c as u32 - '0' as u32)).unwrap_or(c)
            }
            ',' => '٬',
            other => other,
        })
        .collect();
    format!("{} تومان", grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_number() {
        assert_eq!(fmt_number(1_234_567), "1,234,567");
        assert_eq!(fmt_number(0), "0");
        assert_eq!(fmt_number(-42_000), "-42,000");
        assert_eq!(fmt_number(999), "999");
    }

    #[test]
    fn test_fmt_toman() {
        assert_eq!(fmt_toman(32_500_000), "۳۲٬۵۰۰٬۰۰۰ تومان");
        assert_eq!(fmt_toman(0), "۰ تومان");
    }
}
