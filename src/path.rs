//! Component id to node path mapping.
//!
//! Every component's state lives at `<root>/components/<segment>`, where the
//! segment is the id with every byte outside `[A-Za-z0-9_.-]` percent-encoded
//! (`%` included). The ids `.` and `..` are encoded whole. The mapping is
//! therefore injective and never yields an empty, relative or nested
//! segment.

use crate::error::{Error, Result};
use statekeeper_coordination::{child_path, CoordResult, CoordinationError, CoordinationSession, NodeAcl};
use statekeeper_core::limits::COMPONENTS_NODE;
use statekeeper_core::ComponentId;

/// Maps component ids onto node paths under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: String,
    components_root: String,
}

impl PathResolver {
    /// Resolver for an already validated root node
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let components_root = child_path(&root, COMPONENTS_NODE);
        Self {
            root,
            components_root,
        }
    }

    /// Configured root node
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Parent of every component node: `<root>/components`
    pub fn components_root(&self) -> &str {
        &self.components_root
    }

    /// Node path holding `component_id`'s state
    ///
    /// # Examples
    ///
    /// ```
    /// use statekeeper::PathResolver;
    /// use statekeeper_core::ComponentId;
    ///
    /// let paths = PathResolver::new("/app/team1/testing");
    /// assert_eq!(
    ///     paths.resolve(&ComponentId::new("comp-1")).unwrap(),
    ///     "/app/team1/testing/components/comp-1"
    /// );
    /// assert_eq!(
    ///     paths.resolve(&ComponentId::new("a/b")).unwrap(),
    ///     "/app/team1/testing/components/a%2Fb"
    /// );
    /// ```
    pub fn resolve(&self, component_id: &ComponentId) -> Result<String> {
        if component_id.is_empty() {
            return Err(Error::InvalidComponentId(
                "component id must not be empty".to_string(),
            ));
        }
        Ok(child_path(
            &self.components_root,
            &escape_segment(component_id.as_str()),
        ))
    }

    /// Component id stored under child `segment` of the components root
    ///
    /// Returns `None` for segments [`resolve`](Self::resolve) never produces.
    pub fn component_id_of(&self, segment: &str) -> Option<ComponentId> {
        unescape_segment(segment).map(ComponentId::new)
    }

    /// Create every missing ancestor of `path` with an empty payload
    ///
    /// Ancestors created concurrently by someone else count as success.
    pub fn ensure_parents(
        &self,
        session: &dyn CoordinationSession,
        path: &str,
        acl: &NodeAcl,
    ) -> CoordResult<()> {
        for (idx, _) in path.match_indices('/').skip(1) {
            let ancestor = &path[..idx];
            match session.create(ancestor, &[], acl) {
                Ok(_) | Err(CoordinationError::NodeExists(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

/// Percent-encode a component id into a single path segment
pub fn escape_segment(id: &str) -> String {
    if id == "." || id == ".." {
        return "%2E".repeat(id.len());
    }
    let mut out = String::with_capacity(id.len());
    for &b in id.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Inverse of [`escape_segment`]; `None` if `segment` is not its output
pub fn unescape_segment(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = segment.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    let id = String::from_utf8(out).ok()?;
    // Reject non-canonical spellings so the mapping stays one-to-one
    if escape_segment(&id) == segment {
        Some(id)
    } else {
        None
    }
}
