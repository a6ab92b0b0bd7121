/// Truncates `text` to at most `max_chars` characters for log and error output.
///
/// Truncation respects char boundaries and appends `...` when anything was cut.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::truncate_for_log;

    #[test]
    fn unit_truncate_for_log_keeps_short_text() {
        assert_eq!(truncate_for_log("Added Steve", 64), "Added Steve");
    }

    #[test]
    fn regression_truncate_for_log_respects_multibyte_boundaries() {
        assert_eq!(truncate_for_log("こんにちは世界", 5), "こんにちは...");
    }
}
