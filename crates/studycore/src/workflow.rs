use crate::{GraphDefinitionError, Node};
use std::fmt;
use std::sync::Arc;

/// Entry sentinel: edges out of it mark the first layer of nodes.
pub const ENTRY: &str = "__entry__";
/// Exit sentinel: the run is complete once all its predecessors are.
pub const EXIT: &str = "__exit__";

pub fn is_sentinel(name: &str) -> bool {
    name == ENTRY || name == EXIT
}

/// Declared workflow: named nodes plus dependency edges.
///
/// Nodes never reference each other; the topology lives only in `edges`.
/// Nothing is validated here, see the planner.
#[derive(Clone)]
pub struct WorkflowGraph {
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, name: impl Into<String>, node: Arc<dyn Node>) -> &mut Self {
        self.nodes.push(NodeSpec {
            name: name.into(),
            node,
        });
        self
    }

    /// `to` may not start until `from` has completed.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn find_node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Reject duplicate and reserved node names.
    pub fn check_names(&self) -> Result<(), GraphDefinitionError> {
        for (i, spec) in self.nodes.iter().enumerate() {
            if is_sentinel(&spec.name) {
                return Err(GraphDefinitionError::ReservedName(spec.name.clone()));
            }
            if self.nodes[..i].iter().any(|other| other.name == spec.name) {
                return Err(GraphDefinitionError::DuplicateNode(spec.name.clone()));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("edges", &self.edges)
            .finish()
    }
}

/// Node declaration in a workflow
#[derive(Clone)]
pub struct NodeSpec {
    pub name: String,
    pub node: Arc<dyn Node>,
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("node_type", &self.node.node_type())
            .field("owned_fields", &self.node.owned_fields())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: String,
    pub to: String,
}
