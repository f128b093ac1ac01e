/// Characters that may not appear in a depot or resource name.
const NAME_INVALID_CHARS: [char; 4] = [' ', '\n', '\r', ':'];

/// Count occurrences of `delim` in `s`.
pub fn count_delim(s: &str, delim: char) -> usize {
    s.chars().filter(|&c| c == delim).count()
}

/// Split `s` on `delim` into at most `n + 1` pieces. The final piece keeps
/// the rest of the string verbatim, delimiters included, so wrapper
/// messages can carry a nested message in their last field.
pub fn split_on(s: &str, delim: char, n: usize) -> Vec<&str> {
    s.splitn(n + 1, delim).collect()
}

/// True if `s` is non-empty and entirely ASCII digits. Leading zeros are
/// allowed; signs are not, so negative values never pass.
pub fn is_nonneg_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// True if `s` is usable as a depot or resource name.
pub fn valid_name(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| NAME_INVALID_CHARS.contains(&c))
}

/// Remove at most one trailing newline from `s`.
pub fn strip_trailing_newline(s: &str) -> &str {
    s.strip_suffix('\n').unwrap_or(s)
}
