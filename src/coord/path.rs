//! Namespace path validation and ancestor creation.

use crate::coord::{CreateMode, Session, SessionError};
use crate::error::Error;

/// Check that `path` is a well-formed namespace path before it is sent
/// to the coordination service, whose own validation errors are less
/// actionable. `sequential` paths are allowed to end with `/` because
/// the service appends the final suffix itself.
pub fn validate(path: &str, sequential: bool) -> Result<(), Error> {
    let invalid = |reason: &'static str| {
        Err(Error::InvalidPath {
            path: path.to_string(),
            reason,
        })
    };

    if path.is_empty() {
        return invalid("path is empty");
    }
    if !path.starts_with('/') {
        return invalid("path must start with /");
    }
    if path.len() == 1 {
        // the root itself
        return Ok(());
    }
    if !sequential && path.ends_with('/') {
        return invalid("path must not end with /");
    }

    let chars: Vec<char> = path.chars().collect();
    let mut prev = '/';
    for i in 1..chars.len() {
        let c = chars[i];
        let next_is_boundary = i + 1 == chars.len() || chars[i + 1] == '/';
        if c == '\0' {
            return invalid("embedded NUL character");
        } else if c == '/' && prev == '/' {
            return invalid("empty segment (//)");
        } else if c == '.' && prev == '/' && next_is_boundary {
            return invalid("relative path segment (.)");
        } else if c == '.' && prev == '.' && chars[i - 2] == '/' && next_is_boundary {
            return invalid("relative path segment (..)");
        } else if ('\u{1}'..='\u{1f}').contains(&c)
            || ('\u{7f}'..='\u{9f}').contains(&c)
            || ('\u{e000}'..='\u{f8ff}').contains(&c)
            || ('\u{fff0}'..='\u{ffff}').contains(&c)
        {
            return invalid("reserved control or private-use code point");
        }
        prev = c;
    }
    Ok(())
}

/// Create every missing node along `path` in root-to-leaf order,
/// tolerating `NodeExists` on each segment. Used when a claim path's
/// parent hierarchy does not yet exist.
pub fn create_all(session: &dyn Session, path: &str) -> Result<(), Error> {
    validate(path, false)?;

    let mut node = String::with_capacity(path.len());
    for segment in path.split('/').skip(1) {
        node.push('/');
        node.push_str(segment);
        match session.create(&node, &[], CreateMode::Persistent) {
            Ok(_) | Err(SessionError::NodeExists(_)) => {}
            Err(err) => return Err(Error::Operation(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::memory::MemoryCluster;
    use crate::coord::{Connector, Timeouts};

    #[test]
    fn rejects_malformed_paths() {
        let cases: [(&str, &str); 8] = [
            ("", "path is empty"),
            ("no-leading-slash", "path must start with /"),
            ("/a/b/", "path must not end with /"),
            ("/a//b", "empty segment (//)"),
            ("/a/./b", "relative path segment (.)"),
            ("/a/..", "relative path segment (..)"),
            ("/a/b\u{0}c", "embedded NUL character"),
            ("/a/b\u{1f}", "reserved control or private-use code point"),
        ];
        for (path, expected) in cases {
            match validate(path, false) {
                Err(Error::InvalidPath { reason, .. }) => assert_eq!(reason, expected, "{path}"),
                other => panic!("expected invalid path for {path:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn accepts_well_formed_paths() {
        validate("/", false).unwrap();
        validate("/IDMaker", false).unwrap();
        validate("/IDMaker/Id-123", false).unwrap();
        validate("/a.b/c..d", false).unwrap();
        // sequential nodes may name their parent directory
        validate("/IDMaker/queue-/", true).unwrap();
    }

    #[test]
    fn create_all_is_idempotent() {
        let cluster = MemoryCluster::new();
        let session = cluster
            .connect(&["local".to_string()], Timeouts::default())
            .unwrap();

        create_all(session.as_ref(), "/IDMfr/a/b/c").unwrap();
        assert!(session.exists("/IDMfr/a/b/c").unwrap());
        // second pass tolerates every segment already existing
        create_all(session.as_ref(), "/IDMfr/a/b/c").unwrap();
    }
}
