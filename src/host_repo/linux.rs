// Linux-specific helpers: /etc/os-release.

/// Read distro name from /etc/os-release (Linux). Prefers NAME, falls back to PRETTY_NAME.
pub(super) fn read_distro_linux() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/etc/os-release").ok()?;
        os_release_value(&content, "NAME").or_else(|| os_release_value(&content, "PRETTY_NAME"))
    }
    #[cfg(not(target_os = "linux"))]
    None
}

/// Value of `key=` in os-release content, unquoted; None when absent or empty.
pub(super) fn os_release_value(content: &str, key: &str) -> Option<String> {
    for line in content.lines() {
        let Some(rest) = line.strip_prefix(key) else {
            continue;
        };
        let Some(v) = rest.strip_prefix('=') else {
            continue;
        };
        let v = v.trim().trim_matches('"').trim_matches('\'');
        return if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        };
    }
    None
}
