//! Small text utilities shared across extraction and injection.

/// Truncate a string to at most `max_chars` characters, ellipsis included.
///
/// Works on character boundaries, never bytes, so multi-byte UTF-8 input
/// cannot cause a panic. The ellipsis counts against the cap: lesson fields
/// have hard upper bounds and a truncated value must still validate.
pub fn truncate_at_char_boundary(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 3 {
        return s.chars().take(max_chars).collect();
    }
    let truncated: String = s.chars().take(max_chars - 3).collect();
    format!("{truncated}...")
}

/// Collapse runs of whitespace (including newlines) into single spaces.
/// Lesson text is rendered inline; embedded newlines would break the
/// injection format.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rough token estimate for budget packing: one token per four characters,
/// rounded up. Deliberately conservative and model-agnostic.
pub fn estimate_tokens(s: &str) -> usize {
    s.chars().count().div_ceil(4)
}

/// Glob matching every file sharing this path's extension, e.g.
/// `src/a.rs` → `**/*.rs`. `None` when the path has no extension.
pub fn extension_glob(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| format!("**/*.{}", ext.to_lowercase()))
}
