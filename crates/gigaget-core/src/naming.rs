//! Output file names: derivation from the URL and collision avoidance.

/// Used when the URL has no usable last path segment.
pub const DEFAULT_FILE_NAME: &str = "download.bin";

const NAME_MAX: usize = 255;

/// Last non-empty path segment of `url`, sanitized, or [`DEFAULT_FILE_NAME`].
pub fn file_name_from_url(url: &str) -> String {
    let segment = url::Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(str::to_string)
    });
    match segment.map(|s| sanitize(&s)) {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_FILE_NAME.to_string(),
    }
}

/// Make `name` safe as a single Linux path component.
///
/// Separators, NUL and control characters become `_` (runs collapse to one);
/// leading/trailing dots, spaces and underscores are trimmed; the result is
/// cut to `NAME_MAX` bytes on a char boundary.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '/' || c == '\\' || c.is_control() {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }
    let trimmed = out.trim_matches(|c: char| c == ' ' || c == '.' || c == '_');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// `name` with a ` (n)` suffix before the extension: `a.iso` → `a (2).iso`.
fn numbered(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

/// First of `name`, `name (1)`, `name (2)`, ... for which `taken` is false.
pub fn unique_name(name: &str, mut taken: impl FnMut(&str) -> bool) -> String {
    if !taken(name) {
        return name.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = numbered(name, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
