// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Best-effort file owner lookup

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// Resolves the owner of a file to a display name.
///
/// Lookups never fail: an empty string means the owner is unknown.
pub trait OwnerLookup {
    fn owner_of(&self, path: &Path) -> String;
}

/// Owner lookup that always reports an unknown owner
pub struct NoOwnerLookup;

impl OwnerLookup for NoOwnerLookup {
    fn owner_of(&self, _path: &Path) -> String {
        String::new()
    }
}

/// Owner lookup backed by the operating system's account database
#[derive(Default)]
pub struct SystemOwnerLookup {
    names: RefCell<HashMap<u32, String>>,
}

impl SystemOwnerLookup {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(unix)]
impl OwnerLookup for SystemOwnerLookup {
    fn owner_of(&self, path: &Path) -> String {
        use std::os::unix::fs::MetadataExt;

        let uid = match std::fs::metadata(path) {
            Ok(meta) => meta.uid(),
            Err(e) => {
                tracing::debug!("Owner lookup failed for {:?}: {}", path, e);
                return String::new();
            }
        };

        self.names
            .borrow_mut()
            .entry(uid)
            .or_insert_with(|| user_name(uid).unwrap_or_else(|| uid.to_string()))
            .clone()
    }
}

#[cfg(not(unix))]
impl OwnerLookup for SystemOwnerLookup {
    fn owner_of(&self, _path: &Path) -> String {
        let _ = &self.names;
        String::new()
    }
}

#[cfg(unix)]
fn user_name(uid: u32) -> Option<String> {
    let mut buf = vec![0 as libc::c_char; 4096];
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    // SAFETY: all pointers refer to live, correctly sized locals; `result` is
    // only dereferenced when getpwuid_r reports success.
    let rc = unsafe {
        libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
    };
    if rc != 0 || result.is_null() || pwd.pw_name.is_null() {
        return None;
    }

    let name = unsafe { std::ffi::CStr::from_ptr(pwd.pw_name) };
    Some(name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_owner_lookup_is_empty() {
        assert_eq!(NoOwnerLookup.owner_of(Path::new("/")), "");
    }

    #[test]
    fn test_missing_path_is_empty() {
        let lookup = SystemOwnerLookup::new();
        assert_eq!(lookup.owner_of(Path::new("/definitely/not/here/at/all")), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_file_has_owner() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let lookup = SystemOwnerLookup::new();
        let first = lookup.owner_of(file.path());
        assert!(!first.is_empty());
        // second lookup hits the cache and agrees
        assert_eq!(lookup.owner_of(file.path()), first);
    }
}
