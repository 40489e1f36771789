//! Number parsing for trace files and command-line arguments.

/// Parse an unsigned 64-bit number written in decimal or `0x` hex.
///
/// Underscores are accepted as digit separators (`0x1_0000_0000`).
/// Returns `None` on empty input, stray characters or overflow.
pub fn parse_u64(text: &str) -> Option<u64> {
    let text = text.trim();
    let (digits, radix) = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (text, 10),
    };

    let mut value: u64 = 0;
    let mut seen_digit = false;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let digit = c.to_digit(radix)?;
        value = value
            .checked_mul(u64::from(radix))?
            .checked_add(u64::from(digit))?;
        seen_digit = true;
    }

    seen_digit.then_some(value)
}
