//! Automatic layered layout
//!
//! Nodes are grouped into levels by repeatedly peeling off every node
//! with no remaining incoming connectors (Kahn's algorithm). Levels are
//! placed left to right; within a level nodes keep their current
//! vertical order and are stacked top to bottom.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::{EditorConfig, LayoutConfig, NodeSizeConfig};
use crate::error::{EditorError, Result};
use crate::events::EditorEvent;
use crate::node::Node;
use crate::types::{NodeId, Position, Size, WILDCARD_DATATYPE};
use crate::workflow::Workflow;

/// Source of rendered node sizes
///
/// The view layer knows the real sizes; [`EstimatedNodeSize`] derives
/// them from port counts and label lengths when no view is attached.
pub trait NodeMeasure: Send + Sync {
    fn measure(&self, node: &Node) -> Size;
}

/// Size estimate from node geometry settings
#[derive(Debug, Clone, Default)]
pub struct EstimatedNodeSize {
    config: NodeSizeConfig,
}

impl EstimatedNodeSize {
    pub fn new(config: NodeSizeConfig) -> Self {
        Self { config }
    }
}

fn output_label(node: &Node, index: usize) -> String {
    let terminal = &node.outputs()[index];
    if terminal.datatypes().iter().any(|t| t == WILDCARD_DATATYPE) {
        terminal.name().to_string()
    } else {
        format!("{} ({})", terminal.name(), terminal.datatypes().join(", "))
    }
}

impl NodeMeasure for EstimatedNodeSize {
    fn measure(&self, node: &Node) -> Size {
        let c = &self.config;
        let rows = (node.inputs().len() + node.outputs().len()) as f64;
        let separator = if !node.inputs().is_empty() && !node.outputs().is_empty() {
            c.separator_height
        } else {
            0.0
        };
        let height = c.header_height + 2.0 * c.margin + rows * c.row_height + separator;

        let title = node.name.chars().count() as f64 * 1.5;
        let widest_label = node
            .inputs()
            .iter()
            .map(|t| t.label().unwrap_or(t.name()).chars().count())
            .chain((0..node.outputs().len()).map(|i| output_label(node, i).chars().count()))
            .max()
            .unwrap_or(0) as f64;
        let width = (title.max(widest_label) * c.char_width).clamp(c.min_width, c.max_width);

        Size { width, height }
    }
}

/// Computed placement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// Node ids per level, left to right
    pub levels: Vec<Vec<NodeId>>,
    pub positions: BTreeMap<NodeId, Position>,
}

impl Layout {
    /// Index of the level holding `id`
    pub fn level_of(&self, id: NodeId) -> Option<usize> {
        self.levels.iter().position(|level| level.contains(&id))
    }
}

/// Group nodes into topological levels
///
/// In-degrees count connectors, so two connectors between the same pair
/// of nodes count twice. Returns [`EditorError::LayoutCycle`] with the
/// nodes left over when no node without predecessors remains.
pub fn topological_levels(workflow: &Workflow) -> Result<Vec<Vec<NodeId>>> {
    let mut in_degree: BTreeMap<NodeId, usize> = workflow.nodes().map(|n| (n.id(), 0)).collect();
    let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for (source, target) in workflow.edges() {
        *in_degree.entry(target.node).or_insert(0) += 1;
        successors.entry(source.node).or_default().push(target.node);
    }

    let mut levels = Vec::new();
    while !in_degree.is_empty() {
        let level: Vec<NodeId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();
        if level.is_empty() {
            return Err(EditorError::LayoutCycle(in_degree.keys().copied().collect()));
        }
        for id in &level {
            in_degree.remove(id);
            for next in successors.get(id).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(next) {
                    *deg -= 1;
                }
            }
        }
        levels.push(level);
    }
    Ok(levels)
}

/// Stateless layered layout
pub struct LayoutEngine {
    config: LayoutConfig,
    measure: Box<dyn NodeMeasure>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig, measure: impl NodeMeasure + 'static) -> Self {
        Self {
            config,
            measure: Box::new(measure),
        }
    }

    /// Engine with estimated node sizes
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(
            config.layout.clone(),
            EstimatedNodeSize::new(config.node_size.clone()),
        )
    }

    /// Compute positions without touching the workflow
    pub fn compute(&self, workflow: &Workflow) -> Result<Layout> {
        let mut levels = topological_levels(workflow)?;
        let mut positions = BTreeMap::new();

        let mut left = self.config.horizontal_pad;
        for level in &mut levels {
            let top_of = |id: &NodeId| workflow.node(*id).map_or(0.0, |n| n.position.top);
            level.sort_by(|a, b| top_of(a).total_cmp(&top_of(b)));

            let mut widest: f64 = 0.0;
            let mut top = self.config.vertical_pad;
            for id in level.iter() {
                let Some(node) = workflow.node(*id) else {
                    continue;
                };
                let size = self.measure.measure(node);
                positions.insert(*id, Position::new(top, left));
                widest = widest.max(size.width);
                top += size.height + self.config.vertical_pad;
            }
            left += widest + self.config.horizontal_pad;
        }

        Ok(Layout { levels, positions })
    }
}

impl Workflow {
    /// Arrange every node in topological levels
    ///
    /// On a cycle nothing moves and [`EditorError::LayoutCycle`] is returned.
    pub fn layout_auto(&mut self, engine: &LayoutEngine) -> Result<Layout> {
        self.flush_active_form();
        let layout = engine.compute(self)?;
        for (id, position) in &layout.positions {
            if let Some(node) = self.nodes.get_mut(id) {
                node.position = *position;
            }
        }
        self.has_changes = true;
        log::debug!("Laid out {} node(s) in {} level(s)", layout.positions.len(), layout.levels.len());
        self.emit(EditorEvent::LayoutApplied {
            levels: layout.levels.len(),
        });
        Ok(layout)
    }
}
