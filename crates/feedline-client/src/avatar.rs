//! Avatar reference resolution.

/// Placeholder avatar: a grey silhouette as an inline SVG data URL.
pub const DEFAULT_AVATAR: &str = "data:image/svg+xml,%3Csvg xmlns='http://www.w3.org/2000/svg' width='200' height='200'%3E%3Ccircle cx='100' cy='100' r='100' fill='%23e0e0e0'/%3E%3Cpath d='M100 90c-16.5 0-30-13.5-30-30s13.5-30 30-30 30 13.5 30 30-13.5 30-30 30zm0 20c-33 0-60 20-60 45v15h120v-15c0-25-27-45-60-45z' fill='%23bdbdbd'/%3E%3C/svg%3E";

/// Map a possibly absent or blank avatar reference to something renderable.
pub fn resolve_avatar(reference: Option<&str>) -> String {
    match reference {
        Some(url) if !url.trim().is_empty() => url.to_string(),
        _ => DEFAULT_AVATAR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, DEFAULT_AVATAR)]
    #[case(Some(""), DEFAULT_AVATAR)]
    #[case(Some("   "), DEFAULT_AVATAR)]
    #[case(Some("/media/ana.png"), "/media/ana.png")]
    #[case(Some("https://cdn.example.com/a.webp"), "https://cdn.example.com/a.webp")]
    fn test_resolve_avatar(#[case] input: Option<&str>, #[case] expected: &str) {
        assert_eq!(resolve_avatar(input), expected);
    }
}
