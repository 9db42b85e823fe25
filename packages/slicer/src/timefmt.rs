/// Parse a slicer print-duration string into seconds.
///
/// Accepts a bare number of seconds (`"6293"`, `"6293.5"`) or a human
/// string of `d`/`h`/`m`/`s` segments in any mix of spacing and case:
/// `"1h 30m 45s"`, `"1h30m45s"`, `"2d 1h"`, `"45s"`.
pub fn parse_print_duration(input: &str) -> Option<u64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(seconds) = input.parse::<u64>() {
        return Some(seconds);
    }
    if let Ok(seconds) = input.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(seconds.round() as u64);
        }
        return None;
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut saw_segment = false;

    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c.is_whitespace() {
            if digits.is_empty() {
                continue;
            }
            // A number must be followed by its unit, not a space.
            return None;
        }
        let factor = match c.to_ascii_lowercase() {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        let value: u64 = digits.parse().ok()?;
        total = total.checked_add(value.checked_mul(factor)?)?;
        digits.clear();
        saw_segment = true;
    }

    if !digits.is_empty() || !saw_segment {
        return None;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_seconds() {
        assert_eq!(parse_print_duration("6293"), Some(6293));
        assert_eq!(parse_print_duration(" 42 "), Some(42));
        assert_eq!(parse_print_duration("90.6"), Some(91));
    }

    #[test]
    fn human_segments() {
        assert_eq!(parse_print_duration("1h 30m 45s"), Some(5445));
        assert_eq!(parse_print_duration("1h30m45s"), Some(5445));
        assert_eq!(parse_print_duration("2d 1h"), Some(176_400));
        assert_eq!(parse_print_duration("45s"), Some(45));
        assert_eq!(parse_print_duration("11H 5M"), Some(39_900));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_print_duration(""), None);
        assert_eq!(parse_print_duration("soon"), None);
        assert_eq!(parse_print_duration("1x 30m"), None);
        assert_eq!(parse_print_duration("1h 30"), None);
        assert_eq!(parse_print_duration("-5"), None);
    }
}
