mod common;

use common::{Journal, ScriptedNode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use studycore::{GraphDefinitionError, StateField, WorkflowGraph, ENTRY, EXIT};
use studyruntime::ExecutionPlan;

fn node(journal: &Journal) -> std::sync::Arc<dyn studycore::Node> {
    ScriptedNode::new(journal, &[]).arc()
}

fn study_shape(journal: &Journal) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new("study");
    graph
        .add_node("summary", ScriptedNode::new(journal, &[StateField::SummaryNotes]).arc())
        .add_node("quiz", ScriptedNode::new(journal, &[StateField::Quiz]).arc())
        .add_node("recs", ScriptedNode::new(journal, &[StateField::Recommendations]).arc())
        .add_node("mindmap", ScriptedNode::new(journal, &[StateField::Mindmap]).arc())
        .add_node("narration", ScriptedNode::new(journal, &[StateField::PodcastScript]).arc())
        .add_edge(ENTRY, "summary");
    for branch in ["quiz", "recs", "mindmap", "narration"] {
        graph.add_edge("summary", branch).add_edge(branch, EXIT);
    }
    graph
}

/// Random DAG over `n` nodes: edges only go from lower to higher index,
/// sources hang off entry and sinks feed exit.
fn random_dag(journal: &Journal, rng: &mut StdRng, n: usize) -> (WorkflowGraph, Vec<(String, String)>) {
    let names: Vec<String> = (0..n).map(|i| format!("n{}", i)).collect();
    let mut graph = WorkflowGraph::new("random");
    for name in &names {
        graph.add_node(name.clone(), node(journal));
    }

    let mut edges = Vec::new();
    let mut has_in = vec![false; n];
    let mut has_out = vec![false; n];
    for i in 0..n {
        for j in (i + 1)..n {
            if rng.gen_bool(1.0 / 3.0) {
                edges.push((names[i].clone(), names[j].clone()));
                has_out[i] = true;
                has_in[j] = true;
            }
        }
    }
    for (from, to) in &edges {
        graph.add_edge(from.clone(), to.clone());
    }
    for i in 0..n {
        if !has_in[i] {
            graph.add_edge(ENTRY, names[i].clone());
        }
        if !has_out[i] {
            graph.add_edge(names[i].clone(), EXIT);
        }
    }
    (graph, edges)
}

#[test]
fn test_study_graph_levels() {
    let journal = Journal::default();
    let plan = ExecutionPlan::compile(&study_shape(&journal)).unwrap();

    assert_eq!(plan.len(), 5);
    assert_eq!(
        plan.levels(),
        vec![vec!["summary"], vec!["mindmap", "narration", "quiz", "recs"]]
    );
    assert_eq!(plan.predecessors("quiz").unwrap(), ["summary".to_string()]);
    assert!(plan.predecessors("summary").unwrap().is_empty());
    assert_eq!(plan.successors("summary").unwrap().len(), 4);
    assert_eq!(plan.owner_of(StateField::Quiz), Some("quiz"));
}

#[test]
fn test_random_dags_compile_in_edge_order() {
    let journal = Journal::default();
    let mut rng = StdRng::seed_from_u64(0x9E37_79B9_7F4A_7C15);

    for case in 0..50 {
        let n = rng.gen_range(1..=8);
        let (graph, edges) = random_dag(&journal, &mut rng, n);
        let plan = ExecutionPlan::compile(&graph).unwrap();

        let position: HashMap<&str, usize> =
            plan.order().enumerate().map(|(i, name)| (name, i)).collect();
        assert_eq!(position.len(), n);
        for (from, to) in &edges {
            assert!(
                position[from.as_str()] < position[to.as_str()],
                "case {}: {} must precede {}",
                case,
                from,
                to
            );
        }
    }
}

#[test]
fn test_random_dags_with_back_edge_are_rejected() {
    let journal = Journal::default();
    let mut rng = StdRng::seed_from_u64(0xD1B5_4A32_D192_ED03);

    for case in 0..30 {
        let n = rng.gen_range(2..=7);
        let (mut graph, edges) = random_dag(&journal, &mut rng, n);
        // Close a loop: reverse an existing edge or tie the ends together.
        match edges.first() {
            Some((from, to)) => graph.add_edge(to.clone(), from.clone()),
            None => graph
                .add_edge("n0", format!("n{}", n - 1))
                .add_edge(format!("n{}", n - 1), "n0"),
        };

        let err = ExecutionPlan::compile(&graph).err();
        assert!(
            matches!(err, Some(GraphDefinitionError::Cycle { .. })),
            "case {}: expected cycle, got {:?}",
            case,
            err
        );
    }
}

#[test]
fn test_self_loop_is_a_cycle() {
    let journal = Journal::default();
    let mut graph = WorkflowGraph::new("loop");
    graph
        .add_node("a", node(&journal))
        .add_edge(ENTRY, "a")
        .add_edge("a", "a")
        .add_edge("a", EXIT);

    assert_eq!(
        ExecutionPlan::compile(&graph).err(),
        Some(GraphDefinitionError::Cycle { node: "a".into() })
    );
}

#[test]
fn test_dangling_edge_is_rejected() {
    let journal = Journal::default();
    let mut graph = WorkflowGraph::new("dangling");
    graph
        .add_node("a", node(&journal))
        .add_edge(ENTRY, "a")
        .add_edge("a", "ghost")
        .add_edge("a", EXIT);

    assert_eq!(
        ExecutionPlan::compile(&graph).err(),
        Some(GraphDefinitionError::UnknownNode {
            from: "a".into(),
            to: "ghost".into(),
            missing: "ghost".into(),
        })
    );
}

#[test]
fn test_node_without_entry_path_is_rejected() {
    let journal = Journal::default();
    let mut graph = WorkflowGraph::new("orphan");
    graph
        .add_node("a", node(&journal))
        .add_node("orphan", node(&journal))
        .add_edge(ENTRY, "a")
        .add_edge("a", EXIT)
        .add_edge("orphan", EXIT);

    assert_eq!(
        ExecutionPlan::compile(&graph).err(),
        Some(GraphDefinitionError::Unreachable("orphan".into()))
    );
}

#[test]
fn test_node_without_exit_path_is_rejected() {
    let journal = Journal::default();
    let mut graph = WorkflowGraph::new("dead end");
    graph
        .add_node("a", node(&journal))
        .add_node("stuck", node(&journal))
        .add_edge(ENTRY, "a")
        .add_edge("a", "stuck")
        .add_edge("a", EXIT);

    assert_eq!(
        ExecutionPlan::compile(&graph).err(),
        Some(GraphDefinitionError::DeadEnd("stuck".into()))
    );
}

#[test]
fn test_shared_field_ownership_is_rejected() {
    let journal = Journal::default();
    let mut graph = WorkflowGraph::new("overlap");
    graph
        .add_node("first", ScriptedNode::new(&journal, &[StateField::Quiz]).arc())
        .add_node("second", ScriptedNode::new(&journal, &[StateField::Quiz]).arc())
        .add_edge(ENTRY, "first")
        .add_edge(ENTRY, "second")
        .add_edge("first", EXIT)
        .add_edge("second", EXIT);

    assert_eq!(
        ExecutionPlan::compile(&graph).err(),
        Some(GraphDefinitionError::FieldOwnedTwice {
            field: StateField::Quiz,
            first: "first".into(),
            second: "second".into(),
        })
    );
}

#[test]
fn test_edges_into_entry_are_rejected() {
    let journal = Journal::default();
    let mut graph = WorkflowGraph::new("backwards");
    graph
        .add_node("a", node(&journal))
        .add_edge(ENTRY, "a")
        .add_edge("a", ENTRY)
        .add_edge("a", EXIT);

    assert_eq!(
        ExecutionPlan::compile(&graph).err(),
        Some(GraphDefinitionError::SentinelMisuse {
            from: "a".into(),
            to: ENTRY.into(),
        })
    );
}

#[test]
fn test_repeated_edges_count_once() {
    let journal = Journal::default();
    let mut graph = WorkflowGraph::new("repeat");
    graph
        .add_node("a", node(&journal))
        .add_node("b", node(&journal))
        .add_edge(ENTRY, "a")
        .add_edge("a", "b")
        .add_edge("a", "b")
        .add_edge("b", EXIT);

    let plan = ExecutionPlan::compile(&graph).unwrap();
    assert_eq!(plan.predecessors("b").unwrap(), ["a".to_string()]);
}

#[test]
fn test_compiling_never_invokes_nodes() {
    let journal = Journal::default();
    let _ = ExecutionPlan::compile(&study_shape(&journal)).unwrap();

    assert!(journal.entries().is_empty());
}
