// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Resolving "Move to" folder names to real directories

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

/// A place to look for an existing folder with the requested name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// Directly under the base directory
    Base,
    /// Under each sibling of the base directory
    Siblings,
    /// Under each ancestor of the base directory, nearest first
    Ancestors,
}

impl SearchScope {
    /// Candidate locations for `name`, in the order they are tried
    fn candidates(&self, base: &Path, name: &str) -> Vec<PathBuf> {
        match self {
            Self::Base => vec![base.join(name)],
            Self::Siblings => siblings_of(base).into_iter().map(|s| s.join(name)).collect(),
            Self::Ancestors => base.ancestors().skip(1).map(|a| a.join(name)).collect(),
        }
    }
}

fn siblings_of(base: &Path) -> Vec<PathBuf> {
    let Some(parent) = base.parent() else {
        return Vec::new();
    };

    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list siblings of {:?}: {}", base, e);
            return Vec::new();
        }
    };

    let mut siblings: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p != base)
        .collect();
    siblings.sort();
    siblings
}

/// How a target folder was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOrigin {
    Found,
    Created,
    /// Would be created; nothing was touched
    Planned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetFolder {
    pub path: PathBuf,
    pub origin: TargetOrigin,
}

/// Resolved "Move to" name -> directory table.
///
/// Built once per run and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct TargetFolderMap {
    folders: BTreeMap<String, TargetFolder>,
}

impl TargetFolderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, folder: TargetFolder) {
        self.folders.insert(name.into(), folder);
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.folders.get(name).map(|f| f.path.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TargetFolder)> {
        self.folders.iter()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// A folder name that cannot escape the directory it is joined to
fn is_plain_folder_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
        && !name.contains(['/', '\\'])
}

/// Resolve every name to a directory.
///
/// Scopes are searched in `order`; the first existing directory wins. A name
/// found nowhere gets a new folder next to the base directory, or is recorded
/// as planned when `create_missing` is false. Names that are not plain folder
/// names, or whose folder cannot be created, are left out of the map.
pub fn reconcile_targets(
    base: &Path,
    names: &BTreeSet<String>,
    order: &[SearchScope],
    create_missing: bool,
) -> TargetFolderMap {
    let mut map = TargetFolderMap::new();

    for name in names {
        if !is_plain_folder_name(name) {
            warn!("Ignoring move target '{}': not a plain folder name", name);
            continue;
        }

        let found = order
            .iter()
            .flat_map(|scope| scope.candidates(base, name))
            .find(|candidate| candidate.is_dir());

        if let Some(path) = found {
            debug!("Move target '{}' found at {:?}", name, path);
            map.insert(name.clone(), TargetFolder { path, origin: TargetOrigin::Found });
            continue;
        }

        let path = base.parent().unwrap_or(base).join(name);
        if !create_missing {
            info!("Move target '{}' would be created at {:?}", name, path);
            map.insert(name.clone(), TargetFolder { path, origin: TargetOrigin::Planned });
            continue;
        }

        match std::fs::create_dir_all(&path) {
            Ok(()) => {
                info!("Directory created: {:?}", path);
                map.insert(name.clone(), TargetFolder { path, origin: TargetOrigin::Created });
            }
            Err(e) => error!("Failed to create move target {:?}: {}", path, e),
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const ALL: [SearchScope; 3] = [SearchScope::Base, SearchScope::Siblings, SearchScope::Ancestors];

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_found_under_base_first() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("share/base");
        fs::create_dir_all(base.join("Keep")).unwrap();
        fs::create_dir_all(dir.path().join("share/other/Keep")).unwrap();

        let map = reconcile_targets(&base, &names(&["Keep"]), &ALL, true);
        assert_eq!(map.get("Keep"), Some(base.join("Keep").as_path()));
    }

    #[test]
    fn test_found_under_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("share/base");
        fs::create_dir_all(&base).unwrap();
        fs::create_dir_all(dir.path().join("share/other/Keep")).unwrap();

        let map = reconcile_targets(&base, &names(&["Keep"]), &ALL, true);
        assert_eq!(map.get("Keep"), Some(dir.path().join("share/other/Keep").as_path()));
    }

    #[test]
    fn test_found_under_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("share/base");
        fs::create_dir_all(&base).unwrap();
        fs::create_dir_all(dir.path().join("Keep")).unwrap();

        let map = reconcile_targets(&base, &names(&["Keep"]), &ALL, true);
        assert_eq!(map.get("Keep"), Some(dir.path().join("Keep").as_path()));
    }

    #[test]
    fn test_search_order_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("share/base");
        fs::create_dir_all(base.join("Keep")).unwrap();
        fs::create_dir_all(dir.path().join("Keep")).unwrap();

        let map = reconcile_targets(&base, &names(&["Keep"]), &[SearchScope::Ancestors, SearchScope::Base], true);
        assert_eq!(map.get("Keep"), Some(dir.path().join("Keep").as_path()));
    }

    #[test]
    fn test_missing_folder_created_beside_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("share/base");
        fs::create_dir_all(&base).unwrap();

        let map = reconcile_targets(&base, &names(&["Archive 2024"]), &[SearchScope::Base], true);
        let created = dir.path().join("share/Archive 2024");
        assert_eq!(map.get("Archive 2024"), Some(created.as_path()));
        assert!(created.is_dir());

        // Running again finds the folder instead of creating another
        let again = reconcile_targets(&base, &names(&["Archive 2024"]), &ALL, true);
        assert_eq!(again.get("Archive 2024"), Some(created.as_path()));
        assert_eq!(again.iter().next().unwrap().1.origin, TargetOrigin::Found);
    }

    #[test]
    fn test_planned_when_not_creating() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base");
        fs::create_dir_all(&base).unwrap();

        let map = reconcile_targets(&base, &names(&["New"]), &[SearchScope::Base], false);
        let (_, folder) = map.iter().next().unwrap();
        assert_eq!(folder.origin, TargetOrigin::Planned);
        assert!(!dir.path().join("New").exists());
    }

    #[test]
    fn test_unsafe_names_are_not_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base");
        fs::create_dir_all(&base).unwrap();

        let map = reconcile_targets(&base, &names(&["..", "a/b", "/etc"]), &ALL, true);
        assert!(map.is_empty());
    }

    #[test]
    fn test_a_file_with_the_name_is_not_a_match() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("share/base");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("Keep"), b"not a folder").unwrap();

        let map = reconcile_targets(&base, &names(&["Keep"]), &[SearchScope::Base], true);
        assert_eq!(map.get("Keep"), Some(dir.path().join("share/Keep").as_path()));
    }
}
