// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Common base directory of the paths under remediation

use std::path::{Component, Path, PathBuf};

/// Deepest directory that is an ancestor of every path.
///
/// Comparison is by path components. When the common prefix is itself one of
/// the inputs (a folder row alongside its own contents), its parent is used so
/// the result is a strict ancestor. Returns `None` for empty input or when the
/// paths share no root at all (different drives).
pub fn infer_base_directory<'a, I>(paths: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = &'a Path>,
{
    let paths: Vec<&Path> = paths.into_iter().collect();
    let first = paths.first()?;

    let mut common: Vec<Component> = first.components().collect();
    for path in &paths[1..] {
        let shared = common
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }

    if common.is_empty() {
        return None;
    }

    let mut base: PathBuf = common.iter().collect();
    if paths.iter().any(|p| *p == base.as_path()) {
        // The filesystem root has no parent and stays as is
        if let Some(parent) = base
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
        {
            base = parent;
        }
    }

    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(paths: &[&str]) -> Option<PathBuf> {
        infer_base_directory(paths.iter().map(Path::new))
    }

    #[test]
    fn test_common_ancestor() {
        assert_eq!(infer(&["/a/b/c/f1", "/a/b/d/f2"]), Some(PathBuf::from("/a/b")));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(infer(&[]), None);
    }

    #[test]
    fn test_single_file_uses_parent() {
        assert_eq!(infer(&["/a/b/f1.txt"]), Some(PathBuf::from("/a/b")));
    }

    #[test]
    fn test_component_wise_not_string_prefix() {
        assert_eq!(infer(&["/data/project/x", "/data/project-old/y"]), Some(PathBuf::from("/data")));
    }

    #[test]
    fn test_folder_with_its_own_contents() {
        assert_eq!(infer(&["/a/b", "/a/b/c/f"]), Some(PathBuf::from("/a")));
    }

    #[cfg(unix)]
    #[test]
    fn test_falls_back_to_root() {
        assert_eq!(infer(&["/x/f", "/y/g"]), Some(PathBuf::from("/")));
        assert_eq!(infer(&["/"]), Some(PathBuf::from("/")));
    }

    #[test]
    fn test_relative_paths_without_shared_prefix() {
        assert_eq!(infer(&["a/f", "b/g"]), None);
    }
}
