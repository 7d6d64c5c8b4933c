pub const SEGMENT_SEPARATOR: char = '\\';

/// Leading segment of upgrades shipped by the host application itself.
pub const APP_SEGMENT: &str = "App";

/// Package an upgrade originates from.
///
/// Identities starting with `App` belong to the host application; everything
/// else is `Vendor\Package\...` and reports the package segment. Identities
/// too short to carry a package segment fall back to their first segment.
pub fn package_label(namespace: &str) -> &str {
    if namespace.starts_with(APP_SEGMENT) {
        return APP_SEGMENT;
    }

    let mut segments = namespace.split(SEGMENT_SEPARATOR);
    let first = segments.next().unwrap_or_default();

    match segments.next() {
        Some(package) if !package.is_empty() => package,
        _ => first,
    }
}

pub fn class_label(namespace: &str) -> &str {
    namespace
        .rsplit(SEGMENT_SEPARATOR)
        .next()
        .unwrap_or(namespace)
}

/// Notice title of an upgrade: the snake_case class label.
pub fn title(namespace: &str) -> String {
    snake_case(class_label(namespace))
}

/// Inserts `_` before every ASCII capital that is not the first character,
/// then lowercases: `AddColumn` -> `add_column`, `HTTPClient` ->
/// `h_t_t_p_client`.
pub fn snake_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    for (idx, ch) in value.chars().enumerate() {
        if idx > 0 && ch.is_ascii_uppercase() {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}
