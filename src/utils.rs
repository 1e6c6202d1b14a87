//! String and path helpers shared by the renderer, batch naming and mail modules

/// Left-pad with zeros to `width` characters, keeping a leading sign in front
///
/// Strings already at least `width` characters long are returned unchanged.
///
/// # Examples
///
/// ```
/// use slm_batch::utils::zfill;
///
/// assert_eq!(zfill("8123456789", 12), "008123456789");
/// assert_eq!(zfill("-42", 5), "-0042");
/// ```
pub fn zfill(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len >= width {
        return value.to_string();
    }

    let padding = "0".repeat(width - len);
    match value.chars().next() {
        Some(sign @ ('+' | '-')) => {
            format!("{sign}{padding}{}", &value[sign.len_utf8()..])
        }
        _ => format!("{padding}{value}"),
    }
}

/// Group an integer's digits in threes with `separator`
///
/// # Examples
///
/// ```
/// use slm_batch::utils::group_thousands;
///
/// assert_eq!(group_thousands(1234567, '.'), "1.234.567");
/// assert_eq!(group_thousands(-1000, '.'), "-1.000");
/// ```
pub fn group_thousands(value: i64, separator: char) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    grouped
}

/// Replace path separators so a name component cannot leave its directory
pub fn sanitize_component(value: &str) -> String {
    value.replace(['/', '\\'], "-")
}

/// Percent-decoded last path segment of a URL or filesystem path
///
/// Returns `None` when the reference has no usable basename.
pub fn reference_basename(reference: &str) -> Option<String> {
    let path = match url::Url::parse(reference) {
        Ok(url) if url.scheme().len() > 1 => url.path().to_string(),
        _ => reference.to_string(),
    };

    let segment = path.rsplit(['/', '\\']).next().unwrap_or_default();
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let cleaned = sanitize_component(decoded.trim());

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned)
    }
}
