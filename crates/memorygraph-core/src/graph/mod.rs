//! Traversal and analytics kernel.
//!
//! Operates on in-memory snapshots of the graph (built by the repository via
//! paginated memory and relationship fetches). All work here is synchronous
//! CPU-only code: path finding, neighbourhood expansion, cluster detection,
//! bridge identification, and structural metrics.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::model::{Memory, Relationship, RelationshipCategory, RelationshipType};

/// Default search depth for shortest-path queries.
pub const DEFAULT_PATH_DEPTH: usize = 5;
/// Default bounds for exhaustive path enumeration.
pub const DEFAULT_ALL_PATHS_DEPTH: usize = 4;
pub const DEFAULT_MAX_PATHS: usize = 10;
/// Cluster detection defaults.
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 3;
pub const DEFAULT_MIN_CLUSTER_DENSITY: f64 = 0.3;

// ============================================================================
// SNAPSHOT & RESULT TYPES
// ============================================================================

/// An immutable in-memory copy of the graph.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub memories: Vec<Memory>,
    pub relationships: Vec<Relationship>,
}

/// A path through the memory graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphPath {
    /// Memories along the path, in order
    pub memories: Vec<Memory>,
    /// Edges connecting consecutive memories
    pub relationships: Vec<Relationship>,
    /// Sum of edge strengths along the path
    pub total_strength: f64,
}

impl GraphPath {
    /// Number of hops.
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn average_strength(&self) -> f64 {
        if self.relationships.is_empty() {
            0.0
        } else {
            self.total_strength / self.relationships.len() as f64
        }
    }
}

/// A densely connected group of memories.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryCluster {
    pub memories: Vec<Memory>,
    pub internal_relationships: Vec<Relationship>,
    /// |internal edges| / (n(n-1)/2)
    pub density: f64,
    /// Average internal edge strength
    pub strength: f64,
    pub categories: BTreeSet<RelationshipCategory>,
}

/// A memory connecting two or more clusters.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeNode {
    pub memory: Memory,
    pub connected_clusters: Vec<usize>,
    pub bridge_strength: f64,
}

/// Structural metrics over the whole snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub avg_degree: f64,
    pub density: f64,
    pub avg_strength: f64,
    pub category_distribution: BTreeMap<String, u64>,
    pub type_distribution: BTreeMap<String, u64>,
}

/// Filters applied during neighbourhood expansion.
#[derive(Debug, Clone, Default)]
pub struct NeighborhoodFilter {
    pub relationship_types: Option<Vec<RelationshipType>>,
    pub categories: Option<Vec<RelationshipCategory>>,
    pub min_strength: f64,
}

// ============================================================================
// ADJACENCY
// ============================================================================

type Adjacency<'a> = HashMap<&'a str, Vec<&'a str>>;
type EdgeMap<'a> = HashMap<(&'a str, &'a str), &'a Relationship>;

impl GraphSnapshot {
    pub fn new(memories: Vec<Memory>, relationships: Vec<Relationship>) -> Self {
        Self { memories, relationships }
    }

    fn memory_map(&self) -> HashMap<&str, &Memory> {
        self.memories
            .iter()
            .filter_map(|m| m.id.as_deref().map(|id| (id, m)))
            .collect()
    }

    /// Build the undirected adjacency list and the directed edge map.
    ///
    /// Both directions go into the adjacency list; the edge map holds the
    /// stored direction, plus the reverse direction for bidirectional types
    /// (pointing at the same single edge).
    fn adjacency(&self) -> (Adjacency<'_>, EdgeMap<'_>) {
        let mut adjacency: Adjacency<'_> = HashMap::new();
        let mut edges: EdgeMap<'_> = HashMap::new();

        for rel in &self.relationships {
            let from = rel.from_memory_id.as_str();
            let to = rel.to_memory_id.as_str();
            adjacency.entry(from).or_default().push(to);
            adjacency.entry(to).or_default().push(from);

            edges.insert((from, to), rel);
            if rel.is_bidirectional() {
                edges.insert((to, from), rel);
            } else {
                // Undirected traversal still crosses directed edges backwards;
                // keep the stored edge reachable from either side without
                // shadowing a real reverse edge.
                edges.entry((to, from)).or_insert(rel);
            }
        }

        (adjacency, edges)
    }

    // ------------------------------------------------------------------
    // PATH FINDING
    // ------------------------------------------------------------------

    /// Breadth-first shortest path between two memories, cut off at
    /// `max_depth` hops, honouring an optional relationship-type allow-list.
    pub fn shortest_path(
        &self,
        from_id: &str,
        to_id: &str,
        max_depth: usize,
        relationship_types: Option<&[RelationshipType]>,
    ) -> Option<GraphPath> {
        let memory_map = self.memory_map();
        if !memory_map.contains_key(from_id) || !memory_map.contains_key(to_id) {
            return None;
        }

        let (adjacency, edges) = self.adjacency();
        let allowed: Option<HashSet<RelationshipType>> =
            relationship_types.map(|types| types.iter().copied().collect());

        let mut queue: VecDeque<(&str, Vec<&str>, Vec<&Relationship>)> =
            VecDeque::from([(from_id, vec![from_id], Vec::new())]);
        let mut visited: HashSet<&str> = HashSet::from([from_id]);

        while let Some((current, path_ids, path_rels)) = queue.pop_front() {
            if path_ids.len() > max_depth + 1 {
                continue;
            }

            if current == to_id {
                let memories = path_ids.iter().map(|id| memory_map[id].clone()).collect();
                let total_strength =
                    path_rels.iter().map(|r| r.properties.strength).sum();
                return Some(GraphPath {
                    memories,
                    relationships: path_rels.into_iter().cloned().collect(),
                    total_strength,
                });
            }

            for &neighbor in adjacency.get(current).into_iter().flatten() {
                let Some(&edge) = edges.get(&(current, neighbor)) else {
                    continue;
                };
                if let Some(allowed) = &allowed {
                    if !allowed.contains(&edge.relationship_type) {
                        continue;
                    }
                }
                if visited.insert(neighbor) {
                    let mut next_ids = path_ids.clone();
                    next_ids.push(neighbor);
                    let mut next_rels = path_rels.clone();
                    next_rels.push(edge);
                    queue.push_back((neighbor, next_ids, next_rels));
                }
            }
        }

        None
    }

    /// Depth-first enumeration of paths, bounded by depth and count,
    /// sorted by total strength descending.
    pub fn all_paths(
        &self,
        from_id: &str,
        to_id: &str,
        max_depth: usize,
        max_paths: usize,
    ) -> Vec<GraphPath> {
        let memory_map = self.memory_map();
        if !memory_map.contains_key(from_id) || !memory_map.contains_key(to_id) {
            return Vec::new();
        }

        let (adjacency, edges) = self.adjacency();
        let mut paths: Vec<GraphPath> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([from_id]);
        let mut path_ids: Vec<&str> = vec![from_id];
        let mut path_rels: Vec<&Relationship> = Vec::new();

        fn dfs<'a>(
            current: &'a str,
            target: &str,
            max_depth: usize,
            max_paths: usize,
            adjacency: &Adjacency<'a>,
            edges: &EdgeMap<'a>,
            memory_map: &HashMap<&str, &Memory>,
            visited: &mut HashSet<&'a str>,
            path_ids: &mut Vec<&'a str>,
            path_rels: &mut Vec<&'a Relationship>,
            paths: &mut Vec<GraphPath>,
        ) {
            if paths.len() >= max_paths || path_ids.len() > max_depth + 1 {
                return;
            }

            if current == target {
                let memories = path_ids.iter().map(|id| memory_map[id].clone()).collect();
                let total_strength = path_rels.iter().map(|r| r.properties.strength).sum();
                paths.push(GraphPath {
                    memories,
                    relationships: path_rels.iter().map(|&r| r.clone()).collect(),
                    total_strength,
                });
                return;
            }

            for &neighbor in adjacency.get(current).into_iter().flatten() {
                let Some(&edge) = edges.get(&(current, neighbor)) else {
                    continue;
                };
                if visited.insert(neighbor) {
                    path_ids.push(neighbor);
                    path_rels.push(edge);
                    dfs(
                        neighbor, target, max_depth, max_paths, adjacency, edges, memory_map,
                        visited, path_ids, path_rels, paths,
                    );
                    path_ids.pop();
                    path_rels.pop();
                    visited.remove(neighbor);
                }
            }
        }

        dfs(
            from_id,
            to_id,
            max_depth,
            max_paths,
            &adjacency,
            &edges,
            &memory_map,
            &mut visited,
            &mut path_ids,
            &mut path_rels,
            &mut paths,
        );

        paths.sort_by(|a, b| b.total_strength.total_cmp(&a.total_strength));
        paths
    }

    // ------------------------------------------------------------------
    // NEIGHBOURHOOD
    // ------------------------------------------------------------------

    /// BFS by depth level; each level records `(neighbour, incoming edge)`.
    pub fn neighborhood(
        &self,
        memory_id: &str,
        depth: usize,
        filter: &NeighborhoodFilter,
    ) -> BTreeMap<usize, Vec<(Memory, Relationship)>> {
        let memory_map = self.memory_map();
        if !memory_map.contains_key(memory_id) {
            return BTreeMap::new();
        }

        let (adjacency, mut edges) = self.adjacency();

        if let Some(types) = &filter.relationship_types {
            let allowed: HashSet<_> = types.iter().copied().collect();
            edges.retain(|_, rel| allowed.contains(&rel.relationship_type));
        }
        if let Some(categories) = &filter.categories {
            let allowed: HashSet<_> = categories.iter().copied().collect();
            edges.retain(|_, rel| allowed.contains(&rel.relationship_type.category()));
        }
        if filter.min_strength > 0.0 {
            edges.retain(|_, rel| rel.properties.strength >= filter.min_strength);
        }

        let mut by_depth: BTreeMap<usize, Vec<(Memory, Relationship)>> = BTreeMap::new();
        let mut visited: HashSet<&str> = HashSet::from([memory_id]);
        let mut level: Vec<&str> = vec![memory_id];
        let mut current_depth = 0;

        while !level.is_empty() && current_depth < depth {
            let mut next_level = Vec::new();
            for &current in &level {
                for &neighbor in adjacency.get(current).into_iter().flatten() {
                    let Some(&edge) = edges.get(&(current, neighbor)) else {
                        continue;
                    };
                    if visited.insert(neighbor) {
                        by_depth
                            .entry(current_depth + 1)
                            .or_default()
                            .push((memory_map[neighbor].clone(), edge.clone()));
                        next_level.push(neighbor);
                    }
                }
            }
            level = next_level;
            current_depth += 1;
        }

        by_depth
    }

    // ------------------------------------------------------------------
    // CLUSTERS & BRIDGES
    // ------------------------------------------------------------------

    /// Connected components of the undirected projection, filtered by size
    /// and density, sorted by (size desc, density desc).
    pub fn clusters(&self, min_size: usize, min_density: f64) -> Vec<MemoryCluster> {
        let memory_map = self.memory_map();
        let (adjacency, _) = self.adjacency();

        let mut visited: HashSet<&str> = HashSet::new();
        let mut components: Vec<HashSet<&str>> = Vec::new();

        for id in memory_map.keys() {
            if visited.contains(id) {
                continue;
            }
            let mut component = HashSet::new();
            let mut stack = vec![*id];
            while let Some(node) = stack.pop() {
                if !visited.insert(node) {
                    continue;
                }
                component.insert(node);
                for &neighbor in adjacency.get(node).into_iter().flatten() {
                    if !visited.contains(neighbor) {
                        stack.push(neighbor);
                    }
                }
            }
            if component.len() >= min_size {
                components.push(component);
            }
        }

        let mut clusters = Vec::new();
        for component in components {
            let internal: Vec<Relationship> = self
                .relationships
                .iter()
                .filter(|r| {
                    component.contains(r.from_memory_id.as_str())
                        && component.contains(r.to_memory_id.as_str())
                })
                .cloned()
                .collect();

            let n = component.len();
            let max_edges = (n * (n - 1)) as f64 / 2.0;
            let density = if max_edges > 0.0 { internal.len() as f64 / max_edges } else { 0.0 };
            if density < min_density {
                continue;
            }

            let strength = if internal.is_empty() {
                0.0
            } else {
                internal.iter().map(|r| r.properties.strength).sum::<f64>() / internal.len() as f64
            };
            let categories = internal
                .iter()
                .map(|r| r.relationship_type.category())
                .collect();

            let mut memories: Vec<Memory> = component
                .iter()
                .filter_map(|id| memory_map.get(id).map(|&m| m.clone()))
                .collect();
            memories.sort_by(|a, b| a.id.cmp(&b.id));

            clusters.push(MemoryCluster {
                memories,
                internal_relationships: internal,
                density,
                strength,
                categories,
            });
        }

        clusters.sort_by(|a, b| {
            b.memories
                .len()
                .cmp(&a.memories.len())
                .then_with(|| b.density.total_cmp(&a.density))
        });
        clusters
    }

    /// Memories connecting two or more clusters by a single edge, with
    /// `bridge_strength = min(1, (k/5) * mean incident strength)`,
    /// sorted by bridge strength descending.
    pub fn bridges(&self, clusters: &[MemoryCluster]) -> Vec<BridgeNode> {
        if clusters.len() < 2 {
            return Vec::new();
        }

        let memory_map = self.memory_map();

        // Each node belongs to at most one cluster
        let mut cluster_of: HashMap<&str, usize> = HashMap::new();
        for (index, cluster) in clusters.iter().enumerate() {
            for memory in &cluster.memories {
                if let Some(id) = memory.id.as_deref() {
                    cluster_of.entry(id).or_insert(index);
                }
            }
        }

        let mut reachable: HashMap<&str, BTreeSet<usize>> = HashMap::new();
        for rel in &self.relationships {
            let from = rel.from_memory_id.as_str();
            let to = rel.to_memory_id.as_str();
            let (Some(&from_cluster), Some(&to_cluster)) =
                (cluster_of.get(from), cluster_of.get(to))
            else {
                continue;
            };
            if from_cluster != to_cluster {
                reachable.entry(from).or_default().insert(to_cluster);
                reachable.entry(to).or_default().insert(from_cluster);
            }
        }

        let mut bridges = Vec::new();
        for (id, connected) in reachable {
            if connected.len() < 2 {
                continue;
            }
            let Some(&memory) = memory_map.get(id) else {
                continue;
            };

            let incident: Vec<f64> = self
                .relationships
                .iter()
                .filter(|r| r.involves(id))
                .map(|r| r.properties.strength)
                .collect();
            let mean_strength = if incident.is_empty() {
                0.5
            } else {
                incident.iter().sum::<f64>() / incident.len() as f64
            };

            bridges.push(BridgeNode {
                memory: memory.clone(),
                bridge_strength: ((connected.len() as f64 / 5.0) * mean_strength).min(1.0),
                connected_clusters: connected.into_iter().collect(),
            });
        }

        bridges.sort_by(|a, b| b.bridge_strength.total_cmp(&a.bridge_strength));
        bridges
    }

    // ------------------------------------------------------------------
    // METRICS & CYCLE CHECK
    // ------------------------------------------------------------------

    pub fn metrics(&self) -> GraphMetrics {
        let node_count = self.memories.len();
        let edge_count = self.relationships.len();
        if node_count == 0 {
            return GraphMetrics::default();
        }

        let mut degrees: HashMap<&str, usize> = HashMap::new();
        for rel in &self.relationships {
            *degrees.entry(rel.from_memory_id.as_str()).or_default() += 1;
            *degrees.entry(rel.to_memory_id.as_str()).or_default() += 1;
        }
        let avg_degree = degrees.values().sum::<usize>() as f64 / node_count as f64;

        let max_edges = (node_count * (node_count.saturating_sub(1))) as f64 / 2.0;
        let density = if max_edges > 0.0 { edge_count as f64 / max_edges } else { 0.0 };

        let avg_strength = if edge_count == 0 {
            0.0
        } else {
            self.relationships.iter().map(|r| r.properties.strength).sum::<f64>()
                / edge_count as f64
        };

        let mut category_distribution: BTreeMap<String, u64> = BTreeMap::new();
        let mut type_distribution: BTreeMap<String, u64> = BTreeMap::new();
        for rel in &self.relationships {
            *category_distribution
                .entry(rel.relationship_type.category().as_str().to_string())
                .or_default() += 1;
            *type_distribution
                .entry(rel.relationship_type.as_str().to_string())
                .or_default() += 1;
        }

        GraphMetrics {
            node_count,
            edge_count,
            avg_degree,
            density,
            avg_strength,
            category_distribution,
            type_distribution,
        }
    }

    /// Whether adding a directed edge `from -> to` would close a directed
    /// cycle, i.e. `from` is already reachable from `to`. Reserved for the
    /// `MEMORY_ALLOW_CYCLES` policy.
    pub fn would_create_cycle(&self, from_id: &str, to_id: &str) -> bool {
        let mut forward: HashMap<&str, Vec<&str>> = HashMap::new();
        for rel in &self.relationships {
            forward
                .entry(rel.from_memory_id.as_str())
                .or_default()
                .push(rel.to_memory_id.as_str());
        }

        let mut stack = vec![to_id];
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == from_id {
                return true;
            }
            if visited.insert(node) {
                stack.extend(forward.get(node).into_iter().flatten());
            }
        }
        false
    }
}

// ============================================================================
// TESTS
// ============================================================================
