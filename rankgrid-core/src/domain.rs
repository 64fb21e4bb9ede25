//! Hostname and subject normalization.

/// Normalize a cache/quota subject: trimmed and lowercased.
pub fn normalize_subject(subject: &str) -> String {
    subject.trim().to_lowercase()
}

/// Extract the bare hostname from a URL, stripping a leading `www.`.
///
/// Accepts inputs with or without a scheme. Malformed input yields an empty
/// string rather than an error.
pub fn hostname_from_url(url: &str) -> String {
    let trimmed = url.trim();
    let rest = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed.strip_prefix("//").unwrap_or(trimmed),
    };

    let authority = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("");
    let host_port = authority.rsplit('@').next().unwrap_or("");
    let host = match host_port.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        Some(_) => return String::new(),
        None => host_port,
    };

    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let valid = !host.is_empty()
        && !host.starts_with('.')
        && !host.contains("..")
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if valid {
        host.to_string()
    } else {
        String::new()
    }
}

/// Normalize a caller-supplied domain to a bare hostname.
///
/// Falls back to the trimmed, lowercased input when it cannot be parsed, so a
/// subject is never silently dropped.
pub fn normalize_domain(input: &str) -> String {
    let host = hostname_from_url(input);
    if host.is_empty() {
        normalize_subject(input)
    } else {
        host
    }
}
