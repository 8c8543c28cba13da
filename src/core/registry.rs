/// Deduplicated, insertion-ordered store of resolved taxon nodes
use crate::bio::taxonomy::TaxonNode;
use crate::TaxaTreeError;
use indexmap::IndexMap;
use parking_lot::Mutex;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashSet;
use tracing::debug;

/// Mapping from taxon id to node.
///
/// Insert-only: a node whose id is already present is rejected and the stored
/// node is kept untouched. Iteration follows insertion order so that diagrams
/// come out the same on every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRegistry {
    nodes: IndexMap<u32, TaxonNode>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from nodes in order, rejecting duplicate ids
    pub fn from_nodes<I>(nodes: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = TaxonNode>,
    {
        let mut registry = Self::new();
        for node in nodes {
            let id = node.id;
            if !registry.insert(node) {
                return Err(TaxaTreeError::Invariant(format!(
                    "duplicate node for taxon {}",
                    id
                )));
            }
        }
        Ok(registry)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Register `node`; returns false (and changes nothing) if its id exists
    pub fn insert(&mut self, node: TaxonNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id, node);
        true
    }

    pub fn get(&self, id: u32) -> Option<&TaxonNode> {
        self.nodes.get(&id)
    }

    /// All nodes in insertion order
    pub fn entries(&self) -> impl Iterator<Item = &TaxonNode> + '_ {
        self.nodes.values()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.nodes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_nodes(self) -> Vec<TaxonNode> {
        self.nodes.into_values().collect()
    }

    /// Ids from `id` up to the root, `id` first.
    ///
    /// Stops at a parent that is not registered. The walk is bounded by the
    /// registry size so a corrupted (cyclic) registry cannot loop forever.
    pub fn lineage(&self, id: u32) -> Vec<u32> {
        let mut lineage = Vec::new();
        let mut current = self.get(id);

        while let Some(node) = current {
            if lineage.len() > self.nodes.len() {
                break;
            }
            lineage.push(node.id);
            current = node.parent_id.and_then(|parent| self.get(parent));
        }

        lineage
    }

    pub fn roots(&self) -> Vec<u32> {
        self.entries()
            .filter(|node| node.is_root())
            .map(|node| node.id)
            .collect()
    }

    pub fn children(&self, id: u32) -> Vec<u32> {
        self.entries()
            .filter(|node| node.parent_id == Some(id))
            .map(|node| node.id)
            .collect()
    }

    pub fn species_count(&self) -> usize {
        self.entries().filter(|node| node.is_species).count()
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        self.entries()
            .map(|node| self.lineage(node.id).len())
            .max()
            .unwrap_or(0)
    }

    pub fn common_ancestor(&self, taxon_a: u32, taxon_b: u32) -> Option<u32> {
        let ancestors_a: HashSet<u32> = self.lineage(taxon_a).into_iter().collect();
        self.lineage(taxon_b)
            .into_iter()
            .find(|id| ancestors_a.contains(id))
    }

    /// Check the tree invariants and return the root id.
    ///
    /// A valid registry has every parent registered, no node reachable from
    /// itself, and exactly one root. When `expected_root` is given the root
    /// must be that taxon.
    pub fn validate(&self, expected_root: Option<u32>) -> crate::Result<u32> {
        if self.is_empty() {
            return Err(TaxaTreeError::Invariant("registry is empty".to_string()));
        }

        let mut graph = DiGraphMap::<u32, ()>::with_capacity(self.len(), self.len());
        for node in self.entries() {
            graph.add_node(node.id);
            if let Some(parent) = node.parent_id {
                if parent == node.id {
                    return Err(TaxaTreeError::Invariant(format!(
                        "taxon {} is its own parent",
                        node.id
                    )));
                }
                if !self.contains(parent) {
                    return Err(TaxaTreeError::Invariant(format!(
                        "taxon {} points to unresolved parent {}",
                        node.id, parent
                    )));
                }
                graph.add_edge(node.id, parent, ());
            }
        }

        if petgraph::algo::is_cyclic_directed(&graph) {
            return Err(TaxaTreeError::Invariant(
                "parent links form a cycle".to_string(),
            ));
        }

        let roots = self.roots();
        let root = match roots.as_slice() {
            [root] => *root,
            [] => return Err(TaxaTreeError::Invariant("no root node".to_string())),
            _ => {
                return Err(TaxaTreeError::Invariant(format!(
                    "{} root nodes: {:?}",
                    roots.len(),
                    roots
                )))
            }
        };

        if let Some(expected) = expected_root {
            if expected != root {
                return Err(TaxaTreeError::Invariant(format!(
                    "tree is rooted at {} instead of {}",
                    root, expected
                )));
            }
        }

        Ok(root)
    }

    /// Copy of the registry rooted at `new_root`.
    ///
    /// Every ancestor of `new_root` is removed and `new_root` loses its parent
    /// link. All other nodes are kept, including side branches whose parent was
    /// one of the removed ancestors. An unknown `new_root` leaves the registry
    /// unchanged.
    pub fn reroot(&self, new_root: u32) -> NodeRegistry {
        if !self.contains(new_root) {
            debug!("Re-root target {} not registered, keeping tree as is", new_root);
            return self.clone();
        }

        let removed: HashSet<u32> = self.lineage(new_root).into_iter().skip(1).collect();

        let mut rerooted = NodeRegistry::new();
        for node in self.entries() {
            if removed.contains(&node.id) {
                continue;
            }
            let mut node = node.clone();
            if node.id == new_root {
                node.parent_id = None;
            }
            rerooted.insert(node);
        }

        debug!(
            "Re-rooted at {}: removed {} ancestors, kept {} of {} nodes",
            new_root,
            removed.len(),
            rerooted.len(),
            self.len()
        );
        rerooted
    }

    /// Rebuild the registry with `order` first, remaining nodes after it
    pub fn reordered<I>(&self, order: I) -> NodeRegistry
    where
        I: IntoIterator<Item = u32>,
    {
        let mut reordered = NodeRegistry::new();
        for id in order {
            if let Some(node) = self.get(id) {
                reordered.insert(node.clone());
            }
        }
        for node in self.entries() {
            reordered.insert(node.clone());
        }
        reordered
    }
}

/// Registry shared between resolver workers.
///
/// `claim` is the single atomic "is this id new" decision: an id is handed to
/// exactly one worker, which then fetches and inserts it.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    inner: Mutex<SharedState>,
}

#[derive(Debug, Default)]
struct SharedState {
    registry: NodeRegistry,
    claimed: HashSet<u32>,
}

impl SharedRegistry {
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            inner: Mutex::new(SharedState {
                registry,
                claimed: HashSet::new(),
            }),
        }
    }

    /// True if the caller now owns `id`; false if it is registered or claimed
    pub fn claim(&self, id: u32) -> bool {
        let mut state = self.inner.lock();
        if state.registry.contains(id) {
            return false;
        }
        state.claimed.insert(id)
    }

    pub fn insert(&self, node: TaxonNode) -> bool {
        let mut state = self.inner.lock();
        state.claimed.remove(&node.id);
        state.registry.insert(node)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.inner.lock().registry.contains(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_inner(self) -> NodeRegistry {
        self.inner.into_inner().registry
    }
}
