//! Path resolution and manipulation utilities.

use alloc::vec::Vec;

use log::{debug, trace};

use crate::config::*;
use crate::directory::DirBlock;
use crate::{AccessRights, BlockDevice, Error, Result};

/// Resolves `path` to a block index, starting from the root for absolute paths
/// and from `cwd` otherwise.
///
/// Every directory passed through on the way needs EXECUTE. For the last
/// segment the record's first block is returned, which is EMPTY_BLOCK for a
/// file without content. With `require_dir` the last segment must be a directory.
pub fn resolve(
    device: &impl BlockDevice,
    cwd: u16,
    path: &str,
    require_dir: bool,
) -> Result<u16> {
    let mut current = if path.starts_with(PATH_SEPARATOR) {
        ROOT_BLOCK
    } else {
        cwd
    };

    let components: Vec<&str> = path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()).collect();
    for (i, component) in components.iter().enumerate() {
        let is_last = i == components.len() - 1;
        if component.as_bytes() == DOT_NAME {
            continue;
        }
        if component.as_bytes() == DOTDOT_NAME {
            if current != ROOT_BLOCK {
                current = DirBlock::load(device, current)?.header.parent;
            }
            trace!("'..' -> block {}", current);
            continue;
        }

        let dir = DirBlock::load(device, current)?;
        let entry = dir
            .lookup(component.as_bytes())
            .and_then(|index| dir.entry(index))
            .ok_or(Error::NotFound)?;

        if is_last {
            if require_dir && !entry.is_dir() {
                return Err(Error::NotADirectory);
            }
            current = entry.first_block;
        } else {
            if !entry.is_dir() {
                return Err(Error::NotADirectory);
            }
            if !entry.rights.contains(AccessRights::EXECUTE) {
                debug!("no search permission on '{}'", component);
                return Err(Error::PermissionDenied);
            }
            current = entry.first_block;
        }
    }

    Ok(current)
}

/// Removes trailing separators, keeping a lone "/" intact.
fn trim_trailing(path: &str) -> &str {
    let trimmed = path.trim_end_matches(PATH_SEPARATOR);
    if trimmed.is_empty() && path.starts_with(PATH_SEPARATOR) {
        &path[..1]
    } else {
        trimmed
    }
}

/// Splits a path into (parent path, leaf name).
/// "a/b/c" -> ("a/b", "c"), "/c" -> ("/", "c"), "c" -> ("", "c").
/// An empty parent means the working directory.
pub fn split(path: &str) -> (&str, &str) {
    let path = trim_trailing(path);
    match path.rfind(PATH_SEPARATOR) {
        Some(0) => (&path[..1], &path[1..]),
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split() {
        assert_eq!(split("a/b/c"), ("a/b", "c"));
        assert_eq!(split("/c"), ("/", "c"));
        assert_eq!(split("c"), ("", "c"));
        assert_eq!(split("d/"), ("", "d"));
        assert_eq!(split("/a//b"), ("/a/", "b"));
        assert_eq!(split("/"), ("/", ""));
        assert_eq!(split(""), ("", ""));
        assert_eq!(split("../x"), ("..", "x"));
    }
}
