//! Connectors: directed edges from an output terminal to an input terminal

use serde::{Deserialize, Serialize};

use crate::types::{ConnectorId, TerminalRef};

/// A directed edge between two terminals
///
/// Either end may be unset while a drag gesture is in progress; such a
/// connector is dangling and never survives the end of the gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub id: ConnectorId,
    pub source: Option<TerminalRef>,
    pub target: Option<TerminalRef>,
}

impl Connector {
    pub fn new(id: ConnectorId, source: Option<TerminalRef>, target: Option<TerminalRef>) -> Self {
        Self { id, source, target }
    }

    pub fn is_dangling(&self) -> bool {
        self.source.is_none() || self.target.is_none()
    }

    /// Both endpoints, when the connector is complete
    pub fn endpoints(&self) -> Option<(&TerminalRef, &TerminalRef)> {
        match (&self.source, &self.target) {
            (Some(source), Some(target)) => Some((source, target)),
            _ => None,
        }
    }

    /// Endpoints that are set, source first
    pub fn attached_ends(&self) -> impl Iterator<Item = &TerminalRef> {
        self.source.iter().chain(self.target.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangling_connector() {
        let c = Connector::new(1, Some(TerminalRef::output(0, "out1")), None);
        assert!(c.is_dangling());
        assert!(c.endpoints().is_none());
        assert_eq!(c.attached_ends().count(), 1);
    }

    #[test]
    fn test_complete_connector() {
        let c = Connector::new(
            1,
            Some(TerminalRef::output(0, "out1")),
            Some(TerminalRef::input(1, "in1")),
        );
        assert!(!c.is_dangling());
        let (source, target) = c.endpoints().unwrap();
        assert_eq!(source.node, 0);
        assert_eq!(target.name, "in1");
    }
}
