//! Taxonomy Index Service
//!
//! In-memory lookup over a team's taxonomy forest: a stable textual
//! flattening for prediction prompts, and name-chain resolution for
//! validating predicted tag paths.

use uuid::Uuid;

use crate::models::{TagTaxonomyNode, MAX_TAXONOMY_DEPTH};

/// One taxonomy node with its full name chain
#[derive(Debug, Clone)]
pub struct TaxonomyEntry {
    /// Node identifier
    pub id: Uuid,

    /// Depth in the tree (1-3)
    pub level: u8,

    /// Names from root to this node
    pub path: Vec<String>,
}

/// Indexed view of a team's taxonomy forest
///
/// Children are sorted by id ascending at every level on construction, so
/// renderings and walks are stable across calls.
pub struct TaxonomyIndex {
    roots: Vec<TagTaxonomyNode>,
}

impl TaxonomyIndex {
    pub fn new(mut roots: Vec<TagTaxonomyNode>) -> Self {
        sort_by_id(&mut roots);
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total node count across the forest
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(TagTaxonomyNode::subtree_size).sum()
    }

    /// All nodes grouped by level (1, then 2, then 3), id ascending within
    /// each level
    pub fn entries(&self) -> Vec<TaxonomyEntry> {
        let mut all = Vec::with_capacity(self.node_count());
        for root in &self.roots {
            collect_entries(root, &mut Vec::new(), &mut all);
        }
        all.sort_by_key(|e| (e.level, e.id));
        all
    }

    /// Render the taxonomy for prediction prompts
    ///
    /// Levels are flattened top-down; every line shows the full name chain
    /// and the node id, e.g. `- Marketing > Campaigns (id: ...)`.
    pub fn flatten_text(&self) -> String {
        let entries = self.entries();
        let mut text = String::new();
        let mut current_level = 0;

        for entry in entries {
            if entry.level != current_level {
                if current_level != 0 {
                    text.push('\n');
                }
                text.push_str(&format!("Level {} tags:\n", entry.level));
                current_level = entry.level;
            }
            text.push_str(&format!("- {} (id: {})\n", entry.path.join(" > "), entry.id));
        }

        text
    }

    /// Resolve a 1-3 segment name chain to its taxonomy node
    ///
    /// Returns the final node of the chain when every segment matches a
    /// node name at its level under the previous segment's node; None
    /// otherwise. Names compare after trimming surrounding whitespace;
    /// matching is case-sensitive.
    pub fn resolve_path(&self, tag_path: &[String]) -> Option<&TagTaxonomyNode> {
        if tag_path.is_empty() || tag_path.len() > MAX_TAXONOMY_DEPTH as usize {
            return None;
        }

        let mut current: Option<&TagTaxonomyNode> = None;
        let mut candidates: &[TagTaxonomyNode] = &self.roots;

        for segment in tag_path {
            let name = segment.trim();
            let found = candidates.iter().find(|n| n.name == name)?;
            candidates = &found.children;
            current = Some(found);
        }

        current
    }
}

fn sort_by_id(nodes: &mut [TagTaxonomyNode]) {
    nodes.sort_by_key(|n| n.id);
    for node in nodes {
        sort_by_id(&mut node.children);
    }
}

fn collect_entries(
    node: &TagTaxonomyNode,
    parent_path: &mut Vec<String>,
    out: &mut Vec<TaxonomyEntry>,
) {
    parent_path.push(node.name.clone());
    out.push(TaxonomyEntry {
        id: node.id,
        level: node.level,
        path: parent_path.clone(),
    });
    for child in &node.children {
        collect_entries(child, parent_path, out);
    }
    parent_path.pop();
}
