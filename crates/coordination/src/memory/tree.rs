//! Versioned node tree
//!
//! The data model of the in-memory ensemble: a hierarchical namespace where
//! each node holds one payload, one ACL and one version stamp. All methods
//! take the caller's identity so ACLs are enforced here, in one place.
//!
//! The tree itself is not synchronized; the ensemble wraps it in a lock and
//! every method runs to completion under that lock, which makes each
//! conditional write atomic.

use crate::error::{CoordResult, CoordinationError};
use crate::node::{child_path, parent_path, NodeAcl, Stat};
use chrono::Utc;
use statekeeper_core::validate_node_path;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    acl: NodeAcl,
    stat: Stat,
    children: BTreeSet<String>,
}

/// Hierarchical namespace of versioned nodes
#[derive(Debug)]
pub(crate) struct NodeTree {
    nodes: HashMap<String, Node>,
    /// Last assigned transaction id
    zxid: u64,
    max_payload_bytes: usize,
}

impl NodeTree {
    /// Create a tree holding only the root node
    pub(crate) fn new(max_payload_bytes: usize) -> Self {
        let now = Utc::now();
        let root = Node {
            data: Vec::new(),
            acl: NodeAcl::Open,
            stat: Stat {
                version: 1,
                czxid: 0,
                mzxid: 0,
                ctime: now,
                mtime: now,
                data_length: 0,
                num_children: 0,
            },
            children: BTreeSet::new(),
        };
        let mut nodes = HashMap::new();
        nodes.insert("/".to_string(), root);
        Self {
            nodes,
            zxid: 0,
            max_payload_bytes,
        }
    }

    /// Number of nodes, including the root
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    pub(crate) fn acl(&self, path: &str) -> Option<NodeAcl> {
        self.nodes.get(path).map(|n| n.acl.clone())
    }

    pub(crate) fn create(
        &mut self,
        path: &str,
        data: &[u8],
        acl: &NodeAcl,
        identity: Option<&str>,
    ) -> CoordResult<Stat> {
        check_path(path)?;
        self.check_payload(path, data)?;
        if self.nodes.contains_key(path) {
            return Err(CoordinationError::NodeExists(path.to_string()));
        }
        let parent = parent_path(path).ok_or_else(|| CoordinationError::NodeExists(path.to_string()))?;
        let parent_node = self
            .nodes
            .get(parent)
            .ok_or_else(|| CoordinationError::NoNode(parent.to_string()))?;
        if !parent_node.acl.permits(identity) {
            return Err(CoordinationError::NoAuth(parent.to_string()));
        }
        if let NodeAcl::CreatorOnly { identity: owner } = acl {
            if identity != Some(owner.as_str()) {
                return Err(CoordinationError::InvalidAcl(path.to_string()));
            }
        }

        let zxid = self.next_zxid();
        let now = Utc::now();
        let stat = Stat {
            version: 1,
            czxid: zxid,
            mzxid: zxid,
            ctime: now,
            mtime: now,
            data_length: data.len(),
            num_children: 0,
        };
        self.nodes.insert(
            path.to_string(),
            Node {
                data: data.to_vec(),
                acl: acl.clone(),
                stat: stat.clone(),
                children: BTreeSet::new(),
            },
        );
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.insert(child_name(path).to_string());
            parent_node.stat.num_children = parent_node.children.len();
        }
        Ok(stat)
    }

    pub(crate) fn get_data(&self, path: &str, identity: Option<&str>) -> CoordResult<(Vec<u8>, Stat)> {
        let node = self.readable(path, identity)?;
        Ok((node.data.clone(), node.stat.clone()))
    }

    pub(crate) fn set_data(
        &mut self,
        path: &str,
        data: &[u8],
        expected_version: Option<u64>,
        identity: Option<&str>,
    ) -> CoordResult<Stat> {
        check_path(path)?;
        self.check_payload(path, data)?;
        {
            let node = self
                .nodes
                .get(path)
                .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?;
            if !node.acl.permits(identity) {
                return Err(CoordinationError::NoAuth(path.to_string()));
            }
            if let Some(expected) = expected_version {
                if node.stat.version != expected {
                    return Err(CoordinationError::BadVersion {
                        path: path.to_string(),
                        expected,
                        actual: node.stat.version,
                    });
                }
            }
        }

        let zxid = self.next_zxid();
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?;
        node.data = data.to_vec();
        node.stat.version += 1;
        node.stat.mzxid = zxid;
        node.stat.mtime = Utc::now();
        node.stat.data_length = data.len();
        Ok(node.stat.clone())
    }

    pub(crate) fn delete(
        &mut self,
        path: &str,
        expected_version: Option<u64>,
        identity: Option<&str>,
    ) -> CoordResult<()> {
        check_path(path)?;
        let parent = parent_path(path).ok_or_else(|| CoordinationError::InvalidPath {
            path: path.to_string(),
            reason: "the root node cannot be deleted".to_string(),
        })?;
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?;
        if let Some(parent_node) = self.nodes.get(parent) {
            if !parent_node.acl.permits(identity) {
                return Err(CoordinationError::NoAuth(parent.to_string()));
            }
        }
        if let Some(expected) = expected_version {
            if node.stat.version != expected {
                return Err(CoordinationError::BadVersion {
                    path: path.to_string(),
                    expected,
                    actual: node.stat.version,
                });
            }
        }
        if !node.children.is_empty() {
            return Err(CoordinationError::NotEmpty(path.to_string()));
        }

        self.next_zxid();
        self.nodes.remove(path);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.remove(child_name(path));
            parent_node.stat.num_children = parent_node.children.len();
        }
        Ok(())
    }

    pub(crate) fn get_children(&self, path: &str, identity: Option<&str>) -> CoordResult<Vec<String>> {
        let node = self.readable(path, identity)?;
        Ok(node.children.iter().cloned().collect())
    }

    pub(crate) fn exists(&self, path: &str) -> CoordResult<Option<Stat>> {
        check_path(path)?;
        Ok(self.nodes.get(path).map(|n| n.stat.clone()))
    }

    /// Remove a node and everything below it, ignoring ACLs
    ///
    /// Returns the number of nodes removed.
    pub(crate) fn remove_subtree(&mut self, path: &str) -> usize {
        let Some(parent) = parent_path(path) else {
            return 0;
        };
        let Some(node) = self.nodes.get(path) else {
            return 0;
        };

        let mut pending: Vec<String> = node
            .children
            .iter()
            .map(|c| child_path(path, c))
            .collect();
        self.nodes.remove(path);
        let mut removed = 1;
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                pending.extend(node.children.iter().map(|c| child_path(&next, c)));
                removed += 1;
            }
        }

        self.next_zxid();
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.remove(child_name(path));
            parent_node.stat.num_children = parent_node.children.len();
        }
        removed
    }

    fn readable(&self, path: &str, identity: Option<&str>) -> CoordResult<&Node> {
        check_path(path)?;
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?;
        if !node.acl.permits(identity) {
            return Err(CoordinationError::NoAuth(path.to_string()));
        }
        Ok(node)
    }

    fn check_payload(&self, path: &str, data: &[u8]) -> CoordResult<()> {
        if data.len() > self.max_payload_bytes {
            return Err(CoordinationError::PayloadTooLarge {
                path: path.to_string(),
                size: data.len(),
                limit: self.max_payload_bytes,
            });
        }
        Ok(())
    }

    fn next_zxid(&mut self) -> u64 {
        self.zxid += 1;
        self.zxid
    }
}

fn check_path(path: &str) -> CoordResult<()> {
    validate_node_path(path).map_err(|e| CoordinationError::InvalidPath {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn child_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
