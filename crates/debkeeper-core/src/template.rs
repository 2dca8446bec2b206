//! Source URL templating.
//!
//! Manifest sources may contain `$pname` and `$pversion`, replaced with the
//! package name and the version under test. Anything else beginning with `$`
//! is left alone.

/// Placeholder for the package name.
pub const NAME_PLACEHOLDER: &str = "$pname";

/// Placeholder for the package version.
pub const VERSION_PLACEHOLDER: &str = "$pversion";

/// Substitute placeholders in `template` in a single left-to-right pass.
///
/// Substituted values are never re-scanned, so a name containing
/// `$pversion` is emitted literally.
pub fn render(template: &str, name: &str, version: &str) -> String {
    let mut out = String::with_capacity(template.len() + name.len() + version.len());
    let mut rest = template;
    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        if let Some(after) = tail.strip_prefix(VERSION_PLACEHOLDER) {
            out.push_str(version);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(NAME_PLACEHOLDER) {
            out.push_str(name);
            rest = after;
        } else {
            out.push('$');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Whether the template varies with the version.
pub fn has_version_placeholder(template: &str) -> bool {
    template.contains(VERSION_PLACEHOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_both_placeholders() {
        let url = render(
            "https://dl.example.org/$pname/$pname-$pversion.deb",
            "tool",
            "1.2.3",
        );
        assert_eq!(url, "https://dl.example.org/tool/tool-1.2.3.deb");
    }

    #[test]
    fn no_placeholders_is_identity() {
        let src = "https://example.org/static.deb";
        assert_eq!(render(src, "a", "1"), src);
    }

    #[test]
    fn unknown_dollar_sequences_pass_through() {
        assert_eq!(render("a$b$$pversion$", "n", "9"), "a$b$9$");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        assert_eq!(render("$pname/$pversion", "$pversion", "2"), "$pversion/2");
    }

    #[test]
    fn detects_version_placeholder() {
        assert!(has_version_placeholder("x-$pversion.deb"));
        assert!(!has_version_placeholder("x-$pname.deb"));
    }
}
