//! Tag taxonomy tree model
//!
//! A team's taxonomy is a forest of named category nodes at most three
//! levels deep. Roots are level 1 and have no parent; every other node's
//! level equals its parent's level + 1.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum taxonomy depth (levels 1..=3)
pub const MAX_TAXONOMY_DEPTH: u8 = 3;

/// One node in a team's tag taxonomy
///
/// Read-only from the tagger's perspective: taxonomy maintenance happens
/// upstream, the tagger only resolves predicted tag paths against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagTaxonomyNode {
    /// Node identifier
    pub id: Uuid,

    /// Display name, unique among siblings
    pub name: String,

    /// Depth in the tree: 1 (root), 2, or 3
    pub level: u8,

    /// Parent node, None for roots
    pub parent_id: Option<Uuid>,

    /// Child nodes (empty at the maximum depth)
    #[serde(default)]
    pub children: Vec<TagTaxonomyNode>,
}

impl TagTaxonomyNode {
    pub fn is_root(&self) -> bool {
        self.level == 1 && self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Total node count of this subtree, including self
    pub fn subtree_size(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(TagTaxonomyNode::subtree_size)
            .sum::<usize>()
    }
}
