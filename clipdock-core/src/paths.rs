//! Project path normalization for routing comparisons.
//!
//! Consumers report the project they have open; producers configure the
//! project a job targets. Both sides pass through `normalize_project_path`
//! before equality checks so trailing separators and symlink indirection
//! never cause a matching job to be withheld.

use std::path::{Component, Path, PathBuf};

pub fn normalize_project_path(path: &Path) -> PathBuf {
    // Canonicalize resolves symlinks when the path exists on this host;
    // otherwise fall back to a lexical cleanup.
    match std::fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(_) => lexical_normalize(path),
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    clean.push(Component::ParentDir);
                }
            }
            other => clean.push(other),
        }
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_separators_are_ignored() {
        assert_eq!(
            normalize_project_path(Path::new("/edit/p.proj/")),
            normalize_project_path(Path::new("/edit/p.proj"))
        );
    }

    #[test]
    fn cur_and_parent_dirs_collapse() {
        assert_eq!(
            normalize_project_path(Path::new("/edit/./cuts/../p.proj")),
            PathBuf::from("/edit/p.proj")
        );
    }

    #[test]
    fn symlinks_resolve_to_one_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("p.proj");
        std::fs::write(&real, b"project").unwrap();
        let link = tmp.path().join("alias.proj");
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(&real, &link).unwrap();
            assert_eq!(
                normalize_project_path(&link),
                normalize_project_path(&real)
            );
        }
    }
}
