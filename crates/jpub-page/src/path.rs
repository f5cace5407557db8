//! Request path resolution.
//!
//! A request path such as `/blog/post.html` identifies one concrete page
//! instance. Its *definition path* (`/blog/post`) identifies the page
//! definition shared by every suffix (`.html`, `.json`, ...), and the
//! *resource path* (`/blog/post.xml`) is the file the definition is loaded
//! from.
//!
//! All functions here are pure and total: they never panic and always use `/`
//! as separator, whatever the host platform.

/// Extension of page definition files.
pub const DEFINITION_SUFFIX: &str = "xml";

/// Normalize separators: backslashes become `/`, runs of `/` collapse to one.
fn normalize_separators(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' && result.ends_with('/') {
            continue;
        }
        result.push(c);
    }
    result
}

/// Split a normalized path into (parent, filename). The parent is `None`
/// when the path has no separator at all.
fn split_filename(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some((parent, filename)) => (Some(parent), filename),
        None => (None, path),
    }
}

/// Convert a request path into its definition path.
///
/// Strips the last dot-suffix of the filename component and joins the result
/// back onto the parent directory with `/`. A path without a parent directory
/// yields the page name alone.
///
/// ```
/// use jpub_page::to_definition_path;
///
/// assert_eq!(to_definition_path("/blog/post.html"), "/blog/post");
/// assert_eq!(to_definition_path("/blog/post"), "/blog/post");
/// assert_eq!(to_definition_path("post.json"), "post");
/// ```
#[must_use]
pub fn to_definition_path(request_path: &str) -> String {
    let normalized = normalize_separators(request_path);
    let (parent, filename) = split_filename(&normalized);
    let name = filename
        .rsplit_once('.')
        .map_or(filename, |(name, _)| name);

    match parent {
        Some(parent) => format!("{parent}/{name}"),
        None => name.to_owned(),
    }
}

/// Filename without its suffix, or `None` if the filename has no dot.
#[must_use]
pub fn to_page_name(path: &str) -> Option<String> {
    let normalized = normalize_separators(path);
    let (_, filename) = split_filename(&normalized);
    filename
        .rsplit_once('.')
        .map(|(name, _)| name.to_owned())
}

/// Suffix of the filename (without the dot), or `None` if it has no dot.
#[must_use]
pub fn to_page_type(path: &str) -> Option<String> {
    let normalized = normalize_separators(path);
    let (_, filename) = split_filename(&normalized);
    filename
        .rsplit_once('.')
        .map(|(_, suffix)| suffix.to_owned())
}

/// Last path segment, with any suffix left in place.
#[must_use]
pub fn to_file_name(path: &str) -> String {
    let normalized = normalize_separators(path);
    split_filename(&normalized).1.to_owned()
}

/// Resource path of the file backing a definition path.
///
/// ```
/// assert_eq!(jpub_page::to_resource_path("/blog/post"), "/blog/post.xml");
/// ```
#[must_use]
pub fn to_resource_path(definition_path: &str) -> String {
    format!(
        "{}.{DEFINITION_SUFFIX}",
        normalize_separators(definition_path)
    )
}

/// Definition path of a resource path, if it names a definition file.
#[must_use]
pub fn from_resource_path(resource_path: &str) -> Option<String> {
    let normalized = normalize_separators(resource_path);
    normalized
        .strip_suffix(DEFINITION_SUFFIX)
        .and_then(|p| p.strip_suffix('.'))
        .filter(|p| !p.is_empty() && !p.ends_with('/'))
        .map(str::to_owned)
}
