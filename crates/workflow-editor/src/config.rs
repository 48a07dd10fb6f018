//! Editor configuration
//!
//! Every field has a default from [`defaults`], so a partial JSON file
//! only needs the values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default values for layout and node geometry
pub mod defaults {
    /// Horizontal gap between layout levels, and the left margin
    pub const H_PAD: f64 = 80.0;
    /// Vertical gap between nodes of one level, and the top margin
    pub const V_PAD: f64 = 30.0;
    /// Height of a node's title bar
    pub const HEADER_HEIGHT: f64 = 30.0;
    /// Height of one port row
    pub const ROW_HEIGHT: f64 = 16.0;
    /// Rule drawn between inputs and outputs
    pub const SEPARATOR_HEIGHT: f64 = 15.0;
    /// Inner margin of the node body
    pub const MARGIN: f64 = 5.0;
    /// Approximate width of one label character
    pub const CHAR_WIDTH: f64 = 5.5;
    /// Narrowest node
    pub const MIN_WIDTH: f64 = 150.0;
    /// Widest node
    pub const MAX_WIDTH: f64 = 250.0;
}

/// Spacing used by automatic layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub horizontal_pad: f64,
    pub vertical_pad: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_pad: defaults::H_PAD,
            vertical_pad: defaults::V_PAD,
        }
    }
}

/// Geometry used to estimate rendered node sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSizeConfig {
    pub header_height: f64,
    pub row_height: f64,
    pub separator_height: f64,
    pub margin: f64,
    pub char_width: f64,
    pub min_width: f64,
    pub max_width: f64,
}

impl Default for NodeSizeConfig {
    fn default() -> Self {
        Self {
            header_height: defaults::HEADER_HEIGHT,
            row_height: defaults::ROW_HEIGHT,
            separator_height: defaults::SEPARATOR_HEIGHT,
            margin: defaults::MARGIN,
            char_width: defaults::CHAR_WIDTH,
            min_width: defaults::MIN_WIDTH,
            max_width: defaults::MAX_WIDTH,
        }
    }
}

/// Top-level editor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    pub layout: LayoutConfig,
    pub node_size: NodeSizeConfig,
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded editor config from {:?}", path.as_ref());
        Self::from_json_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = EditorConfig::from_json_str(r#"{"layout": {"horizontalPad": 120.0}}"#).unwrap();
        assert_eq!(config.layout.horizontal_pad, 120.0);
        assert_eq!(config.layout.vertical_pad, defaults::V_PAD);
        assert_eq!(config.node_size, NodeSizeConfig::default());
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(EditorConfig::from_json_str("{}").unwrap(), EditorConfig::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");
        std::fs::write(&path, r#"{"nodeSize": {"rowHeight": 20.0}}"#).unwrap();
        let config = EditorConfig::from_file(&path).unwrap();
        assert_eq!(config.node_size.row_height, 20.0);

        assert!(EditorConfig::from_file(dir.path().join("missing.json")).is_err());
    }
}
