//! Virtual-to-real path translation.

/// Rewrite a virtual path under a login node into the real remote path.
///
/// Structural, never a string replace: the known virtual prefix is
/// stripped and the remainder joined onto the real root, so a path
/// segment that happens to contain the prefix (or the real root) as a
/// literal substring cannot corrupt the result. Pure; callers guarantee
/// `virtual_path` lies at or under `virtual_prefix`.
pub fn translate(virtual_prefix: &str, real_root: &str, virtual_path: &str) -> String {
    let remainder = virtual_path
        .strip_prefix(virtual_prefix)
        .unwrap_or(virtual_path)
        .trim_start_matches('/');
    join_real(real_root, remainder)
}

/// Join a relative remainder onto a real root.
pub(crate) fn join_real(real_root: &str, remainder: &str) -> String {
    if remainder.is_empty() {
        return real_root.to_string();
    }
    let root = real_root.trim_end_matches('/');
    if root.is_empty() {
        format!("/{remainder}")
    } else {
        format!("{root}/{remainder}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_substitution() {
        assert_eq!(translate("/Home/web1/root", "~", "/Home/web1/root"), "~");
        assert_eq!(
            translate("/Home/web1/root", "~", "/Home/web1/root/srv/app.log"),
            "~/srv/app.log"
        );
        assert_eq!(
            translate("/Home/web1/root", "/data", "/Home/web1/root/x"),
            "/data/x"
        );
    }

    #[test]
    fn test_suffix_preserved_byte_for_byte() {
        let suffix = "a b/weird..name/π.txt";
        let real = translate(
            "/Home/db1/postgres",
            "/var/lib",
            &format!("/Home/db1/postgres/{suffix}"),
        );
        assert_eq!(real, format!("/var/lib/{suffix}"));
    }

    #[test]
    fn test_segment_containing_real_root_is_untouched() {
        // A child directory literally named like the real root must not
        // be substituted a second time.
        let real = translate("/Home/web1/root", "/data", "/Home/web1/root/data/file");
        assert_eq!(real, "/data/data/file");
    }

    #[test]
    fn test_root_slash_real_root() {
        assert_eq!(translate("/Home/web1/root", "/", "/Home/web1/root/etc"), "/etc");
        assert_eq!(translate("/Home/web1/root", "/", "/Home/web1/root"), "/");
    }
}
