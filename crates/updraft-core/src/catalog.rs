use std::collections::HashMap;

use crate::{ContentNode, RuntimeVersion, VersionWindow};

/// File set of one release plus the runtime window it needs.
///
/// Nodes are unique by name. Re-inserting a name replaces the node but keeps
/// the position of its first appearance, so iteration follows catalog order.
#[derive(Debug, Clone, Default)]
pub struct ArtifactCatalog {
    runtime_window: Option<VersionWindow<RuntimeVersion>>,
    nodes: Vec<ContentNode>,
    index: HashMap<String, usize>,
}

impl ArtifactCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runtime_window(&self) -> Option<&VersionWindow<RuntimeVersion>> {
        self.runtime_window.as_ref()
    }

    /// Returns `false` if a window was already set; the first one wins.
    pub fn set_runtime_window(&mut self, window: VersionWindow<RuntimeVersion>) -> bool {
        if self.runtime_window.is_some() {
            return false;
        }
        self.runtime_window = Some(window);
        true
    }

    pub fn insert(&mut self, node: ContentNode) {
        match self.index.get(node.name()) {
            Some(&position) => self.nodes[position] = node,
            None => {
                self.index.insert(node.name().to_string(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    pub fn node(&self, name: &str) -> Option<&ContentNode> {
        self.index.get(name).map(|&position| &self.nodes[position])
    }

    pub fn nodes(&self) -> &[ContentNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_file_bytes(&self) -> u64 {
        self.nodes.iter().map(ContentNode::length).sum()
    }

    pub fn is_runtime_compatible(&self, version: &RuntimeVersion) -> bool {
        self.runtime_window
            .as_ref()
            .map_or(true, |window| window.contains(version))
    }

    pub fn is_runtime_too_old(&self, version: &RuntimeVersion) -> bool {
        self.runtime_window
            .as_ref()
            .is_some_and(|window| window.is_too_old(version))
    }

    pub fn is_runtime_too_new(&self, version: &RuntimeVersion) -> bool {
        self.runtime_window
            .as_ref()
            .is_some_and(|window| window.is_too_new(version))
    }
}
