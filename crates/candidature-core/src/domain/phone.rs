use regex::Regex;
use std::sync::LazyLock;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{7,14}$").expect("phone pattern compiles"));

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::is_valid_phone;

    #[test]
    fn accepts_international_numbers() {
        assert!(is_valid_phone("+237690123456"));
        assert!(is_valid_phone("690123456"));
        assert!(is_valid_phone("12345678"));
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("abc123"));
        assert!(!is_valid_phone("+0123456789"));
        assert!(!is_valid_phone("+1234567890123456"));
        assert!(!is_valid_phone("690 12 34 56"));
    }
}
