//! Title to URL slug conversion.

/// Lowercase, hyphen-separated, ASCII-only form of `input`.
///
/// Non-ASCII text is transliterated first, so "Москва" becomes `moskva` and
/// "Việt Nam" becomes `viet-nam`. Runs of other characters collapse into a
/// single `-`, trimmed from both ends. An input with nothing sluggable yields
/// `""`.
pub fn slugify(input: &str) -> String {
    ::slug::slugify(input)
}
