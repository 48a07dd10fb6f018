//! End-to-end editing scenarios through the public API

use std::sync::Arc;

use workflow_editor::{
    DatatypeRegistry, EditorError, EditorEvent, LayoutEngine, Node, NodeId, NodeKind,
    PortDefinition, Position, PostJobAction, RecordingFormRenderer, TerminalRef, VecEventSink,
    Workflow, WorkflowBuilder, WorkflowDocument,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn registry() -> DatatypeRegistry {
    DatatypeRegistry::from_json(
        r#"{
            "ext_to_class_name": {
                "data": "Data",
                "txt": "Text",
                "tabular": "Tabular",
                "interval": "Interval",
                "bed": "Bed"
            },
            "class_to_classes": {
                "Data": {"Data": true},
                "Text": {"Text": true, "Data": true},
                "Tabular": {"Tabular": true, "Text": true, "Data": true},
                "Interval": {"Interval": true, "Tabular": true, "Text": true, "Data": true},
                "Bed": {"Bed": true, "Interval": true, "Tabular": true, "Text": true, "Data": true}
            }
        }"#,
    )
    .unwrap()
}

fn tool(name: &str, inputs: Vec<PortDefinition>, outputs: Vec<PortDefinition>) -> Node {
    Node::new(NodeKind::tool(name), name)
        .with_inputs(inputs)
        .with_outputs(outputs)
}

fn hide_count(workflow: &Workflow, id: NodeId) -> usize {
    workflow
        .node(id)
        .unwrap()
        .post_job_actions()
        .values()
        .filter(|a| a.is_hide())
        .count()
}

#[test]
fn test_bed_output_into_bed_or_tabular_input() {
    init_logging();
    let mut workflow = Workflow::new("scenario", registry());
    let a = workflow.add_node(tool("a", vec![], vec![PortDefinition::new("out1", ["bed"])]));
    let b = workflow.add_node(tool(
        "b",
        vec![PortDefinition::new("in1", ["bed", "tabular"])],
        vec![],
    ));

    let out = TerminalRef::output(a, "out1");
    let inp = TerminalRef::input(b, "in1");
    assert!(workflow.can_accept(&inp, &out));
    assert!(workflow.connect(&out, &inp).unwrap().is_some());

    let json = serde_json::to_value(workflow.to_document()).unwrap();
    assert_eq!(
        json["steps"][b.to_string()]["input_connections"]["in1"],
        serde_json::json!([{"id": a, "output_name": "out1"}])
    );
}

#[test]
fn test_txt_output_rejected_by_bed_input() {
    let mut workflow = Workflow::new("scenario", registry());
    let a = workflow.add_node(tool("a", vec![], vec![PortDefinition::new("out1", ["txt"])]));
    let b = workflow.add_node(tool("b", vec![PortDefinition::new("in1", ["bed"])], vec![]));

    let out = TerminalRef::output(a, "out1");
    let inp = TerminalRef::input(b, "in1");
    assert!(!workflow.can_accept(&inp, &out));
    assert_eq!(workflow.connect(&out, &inp).unwrap(), None);
    assert!(workflow.node(a).unwrap().output("out1").unwrap().connectors().is_empty());
    assert!(workflow.node(b).unwrap().input("in1").unwrap().connectors().is_empty());
}

#[test]
fn test_change_datatype_action_makes_output_acceptable() {
    let mut workflow = Workflow::new("scenario", registry());
    let a = workflow.add_node(tool("a", vec![], vec![PortDefinition::new("out1", ["txt"])]));
    let b = workflow.add_node(tool("b", vec![PortDefinition::new("in1", ["bed"])], vec![]));
    workflow
        .node_mut(a)
        .unwrap()
        .add_post_job_action(PostJobAction::change_datatype("out1", "bed"));

    assert!(workflow.can_accept(&TerminalRef::input(b, "in1"), &TerminalRef::output(a, "out1")));
}

#[test]
fn test_three_node_chain_rectify() {
    let mut workflow = Workflow::new("chain", registry());
    let a = workflow.add_node(tool("a", vec![], vec![PortDefinition::new("out1", ["bed"])]));
    let b = workflow.add_node(tool(
        "b",
        vec![PortDefinition::new("in1", ["bed"])],
        vec![
            PortDefinition::new("out1", ["bed"]),
            PortDefinition::new("out2", ["txt"]),
        ],
    ));
    let c = workflow.add_node(tool("c", vec![PortDefinition::new("in1", ["bed"])], vec![]));
    workflow
        .connect(&TerminalRef::output(a, "out1"), &TerminalRef::input(b, "in1"))
        .unwrap();
    workflow
        .connect(&TerminalRef::output(b, "out1"), &TerminalRef::input(c, "in1"))
        .unwrap();
    workflow.set_workflow_output(b, "out1", true).unwrap();

    workflow.rectify_outputs();

    assert_eq!(hide_count(&workflow, a), 0);
    assert_eq!(hide_count(&workflow, b), 1);
    assert_eq!(hide_count(&workflow, c), 0);
    let hidden = workflow.node(b).unwrap().post_job_actions().values().next().cloned();
    assert_eq!(hidden, Some(PostJobAction::hide("out2")));
    // Untouched nodes keep every output visible
    assert_eq!(workflow.node(a).unwrap().visible_outputs(), vec!["out1"]);
}

#[test]
fn test_rectify_twice_changes_nothing() {
    let mut workflow = Workflow::new("chain", registry());
    let a = workflow.add_node(tool(
        "a",
        vec![],
        vec![
            PortDefinition::new("out1", ["bed"]),
            PortDefinition::new("out2", ["bed"]),
        ],
    ));
    workflow.add_node(tool("b", vec![], vec![PortDefinition::new("out1", ["bed"])]));
    workflow.set_workflow_output(a, "out2", true).unwrap();

    workflow.rectify_outputs();
    let first = workflow.to_document();
    assert!(workflow.rectify_outputs().is_empty());
    assert_eq!(workflow.to_document(), first);
}

#[test]
fn test_document_round_trip() {
    let document = WorkflowBuilder::new("Round trip")
        .add_data_input("Input dataset")
        .at(40.0, 20.0)
        .add_tool("intersect", "Intersect")
        .with_input(PortDefinition::new("input1", ["interval"]))
        .with_input(PortDefinition::new("input2", ["interval"]).with_label("Second"))
        .with_output(PortDefinition::new("output", ["bed"]))
        .with_output(PortDefinition::new("log", ["txt"]))
        .with_tool_state(serde_json::json!({"overlap": "1", "__page__": 0}))
        .with_workflow_outputs(["output"])
        .with_post_job_action(PostJobAction::hide("log"))
        .with_post_job_action(PostJobAction::change_datatype("output", "interval"))
        .at(40.0, 250.0)
        .add_tool("sort1", "Sort")
        .with_input(PortDefinition::new("input", ["tabular"]))
        .with_output(PortDefinition::new("out_file1", ["tabular"]))
        .with_workflow_outputs(["out_file1"])
        .connect(0, "output", 1, "input1")
        .connect(0, "output", 1, "input2")
        .connect(1, "output", 2, "input")
        .build();

    let workflow = Workflow::from_document(&document, registry()).unwrap();
    assert_eq!(workflow.to_document(), document);

    let json = workflow.to_document().to_json().unwrap();
    let reparsed = WorkflowDocument::from_json(&json).unwrap();
    let again = Workflow::from_document(&reparsed, registry()).unwrap();
    assert_eq!(again.to_document(), document);
    assert_eq!(again.next_node_id(), 3);
}

fn sorted_edges(workflow: &Workflow) -> Vec<(TerminalRef, TerminalRef)> {
    let mut edges: Vec<_> = workflow
        .edges()
        .map(|(source, target)| (source.clone(), target.clone()))
        .collect();
    edges.sort();
    edges
}

#[test]
fn test_edited_graph_round_trip() {
    init_logging();
    let mut workflow = Workflow::new("Edited", registry());
    let a = workflow.add_node(tool("a", vec![], vec![PortDefinition::new("out1", ["bed"])]));
    let gone = workflow.add_node(tool("gone", vec![], vec![]));
    let d = workflow.add_node(tool("d", vec![], vec![PortDefinition::new("out1", ["interval"])]));
    let mut merge = tool(
        "merge",
        vec![PortDefinition::new("queries", ["tabular"]).multiple()],
        vec![
            PortDefinition::new("merged", ["bed"]),
            PortDefinition::new("log", ["txt"]),
        ],
    );
    merge.tool_state = Some(serde_json::json!({"queries": 2, "__page__": 0}));
    let b = workflow.add_node(merge);
    let c = workflow.add_node(tool("c", vec![PortDefinition::new("in1", ["bed"])], vec![]));

    workflow.destroy_node(gone).unwrap();
    for source in [a, d] {
        workflow
            .connect(&TerminalRef::output(source, "out1"), &TerminalRef::input(b, "queries"))
            .unwrap()
            .unwrap();
    }
    workflow
        .connect(&TerminalRef::output(b, "merged"), &TerminalRef::input(c, "in1"))
        .unwrap()
        .unwrap();
    workflow.set_workflow_output(b, "merged", true).unwrap();

    let document = workflow.prepare_save();
    let loaded = Workflow::from_document(&document, registry()).unwrap();

    assert_eq!(loaded.node_ids(), vec![a, d, b, c]);
    assert!(loaded.node(gone).is_none());
    assert_eq!(loaded.next_node_id(), c + 1);
    assert_eq!(sorted_edges(&loaded), sorted_edges(&workflow));
    assert_eq!(
        loaded.node(b).unwrap().input("queries").unwrap().connectors().len(),
        2
    );
    for id in workflow.node_ids() {
        let (before, after) = (workflow.node(id).unwrap(), loaded.node(id).unwrap());
        assert_eq!(after.tool_state, before.tool_state);
        assert_eq!(after.workflow_outputs(), before.workflow_outputs());
    }
    assert_eq!(loaded.to_document(), document);
}

#[test]
fn test_layout_is_topological() {
    let mut workflow = Workflow::new("layout", registry());
    let c = workflow.add_node(tool("c", vec![PortDefinition::new("in1", ["data"])], vec![]));
    let b = workflow.add_node(tool(
        "b",
        vec![PortDefinition::new("in1", ["data"])],
        vec![PortDefinition::new("out1", ["bed"])],
    ));
    let a = workflow.add_node(tool("a", vec![], vec![PortDefinition::new("out1", ["bed"])]));
    workflow
        .connect(&TerminalRef::output(a, "out1"), &TerminalRef::input(b, "in1"))
        .unwrap();
    workflow
        .connect(&TerminalRef::output(b, "out1"), &TerminalRef::input(c, "in1"))
        .unwrap();

    let layout = workflow.layout_auto(&LayoutEngine::default()).unwrap();
    for connector in workflow.connectors() {
        let (source, target) = connector.endpoints().unwrap();
        assert!(layout.level_of(target.node).unwrap() > layout.level_of(source.node).unwrap());
    }
    let left = |id| workflow.node(id).unwrap().position.left;
    assert!(left(a) < left(b) && left(b) < left(c));
    assert_eq!(workflow.node(a).unwrap().position, Position::new(30.0, 80.0));
}

#[test]
fn test_layout_cycle_keeps_positions() {
    let sink = Arc::new(VecEventSink::new());
    let mut workflow = Workflow::new("cycle", registry()).with_event_sink(sink.clone());
    let ports = || {
        (
            vec![PortDefinition::new("in1", ["bed"])],
            vec![PortDefinition::new("out1", ["bed"])],
        )
    };
    let (i, o) = ports();
    let a = workflow.add_node(tool("a", i, o).with_position(Position::new(1.0, 2.0)));
    let (i, o) = ports();
    let b = workflow.add_node(tool("b", i, o).with_position(Position::new(3.0, 4.0)));
    workflow
        .connect(&TerminalRef::output(a, "out1"), &TerminalRef::input(b, "in1"))
        .unwrap();
    workflow
        .connect(&TerminalRef::output(b, "out1"), &TerminalRef::input(a, "in1"))
        .unwrap();

    let err = workflow.layout_auto(&LayoutEngine::default()).unwrap_err();
    assert!(matches!(err, EditorError::LayoutCycle(_)));
    assert_eq!(workflow.node(a).unwrap().position, Position::new(1.0, 2.0));
    assert_eq!(workflow.node(b).unwrap().position, Position::new(3.0, 4.0));
    assert!(!sink
        .events()
        .iter()
        .any(|e| matches!(e, EditorEvent::LayoutApplied { .. })));
}

#[test]
fn test_late_refresh_after_edits() {
    let renderer = Arc::new(RecordingFormRenderer::new());
    let mut workflow = Workflow::new("refresh", registry()).with_form_renderer(renderer.clone());
    let a = workflow.add_node(tool("a", vec![], vec![PortDefinition::new("out1", ["bed"])]));
    let b = workflow.add_node(tool("b", vec![PortDefinition::new("in1", ["bed"])], vec![]));
    workflow
        .connect(&TerminalRef::output(a, "out1"), &TerminalRef::input(b, "in1"))
        .unwrap();

    // Refresh for a node deleted before it lands is ignored
    let doomed = workflow.add_node(tool("doomed", vec![], vec![]));
    workflow.destroy_node(doomed).unwrap();
    assert!(!workflow.update_node_data(doomed, Default::default()));

    workflow.set_active_node(b).unwrap();
    let applied = workflow.update_node_data(
        b,
        workflow_editor::NodeData {
            tool_errors: Some(serde_json::json!(["Parameter 'x' is invalid"])),
            data_inputs: Some(vec![PortDefinition::new("in1", ["bed", "interval"])]),
            ..Default::default()
        },
    );
    assert!(applied);
    assert!(!workflow.node(b).unwrap().is_valid());
    assert_eq!(workflow.successors(a), vec![b]);
    assert_eq!(renderer.last_shown().unwrap().node_id, Some(b));
}
