//! Node metadata and access control

use chrono::{DateTime, Utc};
use statekeeper_core::{AccessControl, Credentials};

/// Metadata of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Data version: 1 on creation, +1 per successful write
    pub version: u64,
    /// Transaction id that created the node
    pub czxid: u64,
    /// Transaction id of the last modification
    pub mzxid: u64,
    /// Creation time
    pub ctime: DateTime<Utc>,
    /// Last modification time
    pub mtime: DateTime<Utc>,
    /// Payload length in bytes
    pub data_length: usize,
    /// Number of direct children
    pub num_children: usize,
}

/// Access control list attached to a node at creation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeAcl {
    /// Anyone may read, write, create children and delete
    Open,
    /// Only the given identity may touch the node
    CreatorOnly {
        /// `scheme:principal` of the creator
        identity: String,
    },
}

impl NodeAcl {
    /// ACL for nodes created under `policy` by a session holding `credentials`
    ///
    /// Returns `None` when the policy is creator-only and there is no
    /// identity to restrict to.
    pub fn for_policy(policy: AccessControl, credentials: Option<&Credentials>) -> Option<Self> {
        match policy {
            AccessControl::Open => Some(NodeAcl::Open),
            AccessControl::CreatorOnly => credentials.map(|c| NodeAcl::CreatorOnly {
                identity: c.identity(),
            }),
        }
    }

    /// Whether a session with `identity` may access the node
    pub fn permits(&self, identity: Option<&str>) -> bool {
        match self {
            NodeAcl::Open => true,
            NodeAcl::CreatorOnly { identity: owner } => identity == Some(owner.as_str()),
        }
    }
}

/// Parent of a node path, `None` for the root
///
/// # Examples
///
/// ```
/// use statekeeper_coordination::parent_path;
///
/// assert_eq!(parent_path("/a/b"), Some("/a"));
/// assert_eq!(parent_path("/a"), Some("/"));
/// assert_eq!(parent_path("/"), None);
/// ```
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Join a child name onto a node path
pub fn child_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{}", child)
    } else {
        format!("{}/{}", parent, child)
    }
}
