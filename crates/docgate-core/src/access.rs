//! Access-group classification and query-time access filtering.
//!
//! Documents are grouped by directory convention: the first directory under
//! the document root names the group that may read everything below it.
//! Files directly under the root are public.
//!
//! ```text
//! docs/file.pdf                       -> public
//! docs/OPS-TEAM/file.pdf              -> "OPS-TEAM"
//! docs/FINANCE-READ/reports/2024.pdf  -> "FINANCE-READ"
//! ```

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` pops the previous normal segment. At the root of an absolute path it
/// is dropped; at the start of a relative path it is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Infer the access group of `path` relative to `docs_root`.
///
/// Both paths are normalized first, so `..` segments cannot move a file
/// into or out of a group folder. Returns `None` (public) when the file
/// sits directly under the root, when `path` is not under `docs_root`, or
/// when the first segment is blank.
pub fn infer_group(path: &Path, docs_root: &Path) -> Option<String> {
    let path = normalize_path(path);
    let root = normalize_path(docs_root);
    let relative = path.strip_prefix(&root).ok()?;
    let segments: Vec<&std::ffi::OsStr> = relative
        .components()
        .map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        })
        .collect::<Option<_>>()?;

    if segments.len() < 2 {
        return None;
    }

    let group = segments[0].to_string_lossy();
    if group.trim().is_empty() {
        return None;
    }
    Some(group.into_owned())
}

/// Visibility restriction applied inside the vector index query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessFilter {
    /// Full-collection search.
    Unrestricted,
    /// Points whose `doc_group` is one of these, or whose `doc_group` is absent.
    GroupsOrPublic(Vec<String>),
}

impl AccessFilter {
    /// Build the filter for a caller's group memberships.
    ///
    /// `None` and an empty list both mean no group-based restriction.
    pub fn from_allowed_groups(allowed_groups: Option<&[String]>) -> Self {
        match allowed_groups {
            Some(groups) if !groups.is_empty() => AccessFilter::GroupsOrPublic(groups.to_vec()),
            _ => AccessFilter::Unrestricted,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, AccessFilter::Unrestricted)
    }

    /// Whether a point with this `doc_group` is visible.
    ///
    /// A present but empty group is treated as a set group that no caller
    /// holds unless they list `""` explicitly.
    pub fn permits(&self, doc_group: Option<&str>) -> bool {
        match (self, doc_group) {
            (AccessFilter::Unrestricted, _) => true,
            (AccessFilter::GroupsOrPublic(_), None) => true,
            (AccessFilter::GroupsOrPublic(groups), Some(g)) => groups.iter().any(|a| a == g),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_from_first_segment() {
        let group = infer_group(Path::new("docs/OPS-TEAM/file.pdf"), Path::new("docs/"));
        assert_eq!(group.as_deref(), Some("OPS-TEAM"));
    }

    #[test]
    fn test_nested_directories_use_first_segment() {
        let group = infer_group(
            Path::new("/app/docs/FINANCE-READ/reports/2024.pdf"),
            Path::new("/app/docs"),
        );
        assert_eq!(group.as_deref(), Some("FINANCE-READ"));
    }

    #[test]
    fn test_file_under_root_is_public() {
        assert_eq!(infer_group(Path::new("docs/file.pdf"), Path::new("docs/")), None);
    }

    #[test]
    fn test_path_outside_root_is_public() {
        assert_eq!(
            infer_group(Path::new("/elsewhere/OPS/file.pdf"), Path::new("/app/docs")),
            None
        );
    }

    #[test]
    fn test_blank_segment_is_public() {
        assert_eq!(
            infer_group(Path::new("/app/docs/ /file.pdf"), Path::new("/app/docs")),
            None
        );
    }

    #[test]
    fn test_parent_segments_are_resolved() {
        let root = Path::new("/app/docs");
        assert_eq!(
            infer_group(Path::new("/app/docs/../docs/FINANCE-READ/budget.txt"), root).as_deref(),
            Some("FINANCE-READ")
        );
        assert_eq!(
            infer_group(Path::new("/app/docs/OPS-TEAM/../handbook.txt"), root),
            None
        );
        assert_eq!(
            infer_group(Path::new("/app/docs/./OPS-TEAM/a/../b.pdf"), Path::new("/app/./docs/")).as_deref(),
            Some("OPS-TEAM")
        );
    }

    #[test]
    fn test_escaping_the_root_is_public() {
        assert_eq!(
            infer_group(Path::new("/app/docs/../secrets/HR/x.pdf"), Path::new("/app/docs")),
            None
        );
        assert_eq!(
            infer_group(Path::new("docs/../../OPS/x.pdf"), Path::new("docs")),
            None
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_path(Path::new("../a/b/..")), PathBuf::from("../a"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_empty_groups_mean_unrestricted() {
        assert!(AccessFilter::from_allowed_groups(None).is_unrestricted());
        assert!(AccessFilter::from_allowed_groups(Some(&[])).is_unrestricted());
    }

    #[test]
    fn test_permits() {
        let groups = vec!["OPS-TEAM".to_string()];
        let filter = AccessFilter::from_allowed_groups(Some(&groups));
        assert!(filter.permits(None));
        assert!(filter.permits(Some("OPS-TEAM")));
        assert!(!filter.permits(Some("FINANCE-READ")));
        assert!(!filter.permits(Some("")));
        assert!(AccessFilter::Unrestricted.permits(Some("FINANCE-READ")));
    }
}
