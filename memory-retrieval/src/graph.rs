//! Knowledge graph construction and traversal (component I).

use memory_core::{EntityIdType, GraphEdge, GraphNode, Memory, MemoryId, NodeId, RelationshipType, UserId};
use std::collections::HashMap;

/// Typed multi-edge directed graph scoped to one user.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    nodes: HashMap<NodeId, GraphNode>,
    name_to_id: HashMap<String, NodeId>,
    edges: Vec<GraphEdge>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, merging `memory_ids` if an entity with the same
    /// normalized name already exists.
    pub fn add_node(&mut self, mut node: GraphNode) -> NodeId {
        let key = GraphNode::normalize_name(&node.name);
        if let Some(&existing_id) = self.name_to_id.get(&key) {
            let existing = self.nodes.get_mut(&existing_id).expect("indexed node exists");
            for id in node.memory_ids.drain(..) {
                if !existing.memory_ids.contains(&id) {
                    existing.memory_ids.push(id);
                }
            }
            return existing_id;
        }
        let id = node.id;
        self.name_to_id.insert(key, id);
        self.nodes.insert(id, node);
        id
    }

    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
    }

    pub fn get_node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn get_node_by_name(&self, name: &str) -> Option<&GraphNode> {
        self.name_to_id
            .get(&GraphNode::normalize_name(name))
            .and_then(|id| self.nodes.get(id))
    }

    /// The canonical edge between two nodes, if one exists (first match when
    /// multiple edges connect the same pair).
    pub fn get_edge(&self, source_id: NodeId, target_id: NodeId) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|e| e.source_id == source_id && e.target_id == target_id)
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn has_edge(&self, source_id: NodeId, target_id: NodeId) -> bool {
        self.get_edge(source_id, target_id).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn neighbors(&self, id: NodeId) -> Vec<&GraphNode> {
        self.edges
            .iter()
            .filter(|e| e.source_id == id)
            .filter_map(|e| self.nodes.get(&e.target_id))
            .collect()
    }
}

/// One extracted entity mention, as stored in `memory.metadata.entities`.
#[derive(Debug, Clone)]
pub struct EntityMention {
    pub name: String,
    pub entity_type: String,
    pub confidence: f32,
}

/// Incrementally builds a [`KnowledgeGraph`] from memories carrying
/// `metadata.entities` and infers relationships from memory content.
pub struct GraphBuilder {
    user_id: UserId,
    graph: KnowledgeGraph,
}

impl GraphBuilder {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            graph: KnowledgeGraph::new(),
        }
    }

    /// Extract `metadata.entities` from a memory (if present) and add/merge
    /// the corresponding nodes, then infer relationships between them from
    /// the memory's content.
    pub fn consume(&mut self, memory: &Memory) {
        debug_assert_eq!(memory.user_id, self.user_id);
        let Some(entities_value) = memory.metadata.get("entities") else {
            return;
        };
        let Some(entities) = entities_value.as_array() else {
            return;
        };

        let mut node_ids = Vec::new();
        for entity in entities {
            let Some(name) = entity.get("name").and_then(|v| v.as_str()) else {
                continue;
            };
            let entity_type = entity
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let confidence = entity.get("confidence").and_then(|v| v.as_f64()).unwrap_or(1.0) as f32;

            let mut node = GraphNode::new(name, entity_type.clone());
            node.memory_ids.push(memory.id);
            let id = self.graph.add_node(node);
            node_ids.push((id, entity_type, confidence));
        }

        self.infer_relationships(memory, &node_ids);
    }

    fn infer_relationships(&mut self, memory: &Memory, nodes: &[(NodeId, String, f32)]) {
        let content = memory.content.to_lowercase();
        for pair in nodes.windows(2) {
            let (source_id, _, confidence) = pair[0].clone();
            let (target_id, target_type, _) = pair[1].clone();

            let relationship = if content.contains("depends on") {
                RelationshipType::DependsOn
            } else if content.contains("uses") && target_type == "dependency" {
                RelationshipType::DependsOn
            } else if target_type == "framework" {
                RelationshipType::Uses
            } else if content.contains("calls") && target_type == "api" {
                RelationshipType::Calls
            } else if target_type == "configuration" {
                RelationshipType::Configures
            } else {
                continue;
            };

            self.graph.add_edge(GraphEdge {
                source_id,
                target_id,
                relationship,
                memory_id: memory.id,
                confidence,
            });
        }
    }

    pub fn build(self) -> KnowledgeGraph {
        self.graph
    }
}

/// Registers per-user graphs and performs keyword + multi-hop search against
/// them, producing `(memory_id, score)` pairs consumable by the hybrid
/// retriever.
#[derive(Default)]
pub struct GraphSearch {
    graphs: HashMap<UserId, KnowledgeGraph>,
}

impl GraphSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_graph(&mut self, user_id: UserId, graph: KnowledgeGraph) {
        self.graphs.insert(user_id, graph);
    }

    /// Keyword match on node names, expanded up to two hops through edges.
    pub fn search(&self, user_id: UserId, query: &str, top_k: usize) -> Vec<(MemoryId, f32)> {
        let Some(graph) = self.graphs.get(&user_id) else {
            return Vec::new();
        };
        let needle = query.to_lowercase();
        let mut scores: HashMap<MemoryId, f32> = HashMap::new();

        let seed_nodes: Vec<NodeId> = graph
            .nodes
            .values()
            .filter(|n| needle.contains(&n.name.to_lowercase()) || n.name.to_lowercase().contains(&needle))
            .map(|n| n.id)
            .collect();

        for &seed in &seed_nodes {
            if let Some(node) = graph.get_node(seed) {
                for &mem_id in &node.memory_ids {
                    *scores.entry(mem_id).or_insert(0.0) += 1.0;
                }
            }
            for hop1 in graph.neighbors(seed) {
                for &mem_id in &hop1.memory_ids {
                    *scores.entry(mem_id).or_insert(0.0) += 0.5;
                }
                for hop2 in graph.neighbors(hop1.id) {
                    for &mem_id in &hop2.memory_ids {
                        *scores.entry(mem_id).or_insert(0.0) += 0.25;
                    }
                }
            }
        }

        let mut ranked: Vec<(MemoryId, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);
        ranked
    }
}
