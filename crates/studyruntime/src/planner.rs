use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use studycore::{is_sentinel, GraphDefinitionError, Node, StateField, WorkflowGraph, ENTRY, EXIT};

// Sentinels are always the first two nodes added by `build_graph`.
const ENTRY_INDEX: usize = 0;
const EXIT_INDEX: usize = 1;

/// A node as placed in a compiled plan.
#[derive(Clone)]
pub struct PlannedNode {
    pub name: String,
    pub node: Arc<dyn Node>,
    /// Real nodes that must complete first. Sentinels are not listed.
    pub predecessors: Vec<String>,
    pub successors: Vec<String>,
}

/// Validated, dependency-ordered form of a [`WorkflowGraph`].
///
/// `nodes` is stored in topological order, so iterating it never visits a
/// node before one of its predecessors.
#[derive(Clone)]
pub struct ExecutionPlan {
    name: String,
    nodes: Vec<PlannedNode>,
    index: HashMap<String, usize>,
    owners: HashMap<StateField, String>,
}

impl ExecutionPlan {
    /// Compile a declared graph, rejecting dangling references, cycles,
    /// orphaned nodes and overlapping field ownership.
    pub fn compile(workflow: &WorkflowGraph) -> Result<Self, GraphDefinitionError> {
        workflow.check_names()?;
        let owners = check_ownership(workflow)?;
        let graph = build_graph(workflow)?;

        let entry = NodeIndex::new(ENTRY_INDEX);
        let exit = NodeIndex::new(EXIT_INDEX);

        let sorted = toposort(&graph, None).map_err(|cycle| GraphDefinitionError::Cycle {
            node: graph[cycle.node_id()].clone(),
        })?;

        let mut from_entry = HashSet::new();
        let mut dfs = Dfs::new(&graph, entry);
        while let Some(idx) = dfs.next(&graph) {
            from_entry.insert(idx);
        }

        let reversed = Reversed(&graph);
        let mut to_exit = HashSet::new();
        let mut dfs = Dfs::new(reversed, exit);
        while let Some(idx) = dfs.next(reversed) {
            to_exit.insert(idx);
        }

        let mut nodes = Vec::with_capacity(workflow.nodes.len());
        let mut index = HashMap::with_capacity(workflow.nodes.len());

        for idx in sorted {
            let name = &graph[idx];
            if is_sentinel(name) {
                continue;
            }
            if !from_entry.contains(&idx) {
                return Err(GraphDefinitionError::Unreachable(name.clone()));
            }
            if !to_exit.contains(&idx) {
                return Err(GraphDefinitionError::DeadEnd(name.clone()));
            }

            let spec = workflow
                .find_node(name)
                .ok_or_else(|| GraphDefinitionError::Unreachable(name.clone()))?;

            index.insert(name.clone(), nodes.len());
            nodes.push(PlannedNode {
                name: name.clone(),
                node: spec.node.clone(),
                predecessors: real_neighbors(&graph, idx, Direction::Incoming),
                successors: real_neighbors(&graph, idx, Direction::Outgoing),
            });
        }

        tracing::debug!(
            "Compiled workflow '{}' with {} nodes",
            workflow.name,
            nodes.len()
        );

        Ok(Self {
            name: workflow.name.clone(),
            nodes,
            index,
            owners,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in a topological order consistent with every edge.
    pub fn nodes(&self) -> &[PlannedNode] {
        &self.nodes
    }

    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }

    pub fn node(&self, name: &str) -> Option<&PlannedNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn predecessors(&self, name: &str) -> Option<&[String]> {
        self.node(name).map(|n| n.predecessors.as_slice())
    }

    pub fn successors(&self, name: &str) -> Option<&[String]> {
        self.node(name).map(|n| n.successors.as_slice())
    }

    pub fn owner_of(&self, field: StateField) -> Option<&str> {
        self.owners.get(&field).map(String::as_str)
    }

    /// Group nodes by depth: level 0 depends only on entry, level n on
    /// nodes from levels below n.
    pub fn levels(&self) -> Vec<Vec<&str>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut levels: Vec<Vec<&str>> = Vec::new();

        for node in &self.nodes {
            let level = node
                .predecessors
                .iter()
                .filter_map(|p| depth.get(p.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(&node.name, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(&node.name);
        }

        for level in &mut levels {
            level.sort_unstable();
        }
        levels
    }
}

/// Build the dependency graph, sentinels included, from the declaration.
fn build_graph(workflow: &WorkflowGraph) -> Result<DiGraph<String, ()>, GraphDefinitionError> {
    let mut graph = DiGraph::new();
    let mut node_to_index = HashMap::new();

    for name in [ENTRY, EXIT] {
        let idx = graph.add_node(name.to_string());
        node_to_index.insert(name.to_string(), idx);
    }
    for spec in &workflow.nodes {
        let idx = graph.add_node(spec.name.clone());
        node_to_index.insert(spec.name.clone(), idx);
    }

    for edge in &workflow.edges {
        let lookup = |name: &String| {
            node_to_index
                .get(name)
                .copied()
                .ok_or_else(|| GraphDefinitionError::UnknownNode {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    missing: name.clone(),
                })
        };
        let from = lookup(&edge.from)?;
        let to = lookup(&edge.to)?;

        if edge.to == ENTRY || edge.from == EXIT {
            return Err(GraphDefinitionError::SentinelMisuse {
                from: edge.from.clone(),
                to: edge.to.clone(),
            });
        }

        // Repeated edges would inflate readiness counts.
        graph.update_edge(from, to, ());
    }

    Ok(graph)
}

fn check_ownership(
    workflow: &WorkflowGraph,
) -> Result<HashMap<StateField, String>, GraphDefinitionError> {
    let mut owners: HashMap<StateField, String> = HashMap::new();
    for spec in &workflow.nodes {
        for field in spec.node.owned_fields() {
            if let Some(first) = owners.get(field) {
                return Err(GraphDefinitionError::FieldOwnedTwice {
                    field: *field,
                    first: first.clone(),
                    second: spec.name.clone(),
                });
            }
            owners.insert(*field, spec.name.clone());
        }
    }
    Ok(owners)
}

fn real_neighbors(graph: &DiGraph<String, ()>, idx: NodeIndex, dir: Direction) -> Vec<String> {
    let mut names: Vec<String> = graph
        .neighbors_directed(idx, dir)
        .map(|n| graph[n].clone())
        .filter(|name| !is_sentinel(name))
        .collect();
    names.sort();
    names
}
