// src/utils/html.rs

/// Sanitises author-supplied rich text (question stems, option labels, test
/// descriptions) with ammonia's whitelist. `<script>` is removed together with
/// its content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Cleans an optional field, mapping text that sanitises to nothing to `None`.
pub fn clean_optional(input: Option<String>) -> Option<String> {
    input
        .map(|text| clean_html(&text))
        .filter(|text| !text.trim().is_empty())
}
