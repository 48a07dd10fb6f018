//! Datatype hierarchy lookup
//!
//! Answers "is extension A a subtype of extension B" from a table that
//! maps each extension to its datatype class and each class to the set
//! of classes it derives from (itself included). The table is fetched
//! once per session by the host and never changes afterwards.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Wire form of the datatype table
///
/// Accepts both the service payload (`ext_to_class_name`, and
/// `class_to_classes` with `{class: true}` sets) and the camelCase form
/// with ancestor lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatatypeTable {
    #[serde(alias = "extensionToClass")]
    pub ext_to_class_name: HashMap<String, String>,
    #[serde(alias = "classToAncestors")]
    pub class_to_classes: HashMap<String, AncestorSet>,
}

/// Ancestor classes, as a `{class: true}` map or a plain list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AncestorSet {
    Flags(HashMap<String, bool>),
    List(Vec<String>),
}

impl AncestorSet {
    fn into_set(self) -> HashSet<String> {
        match self {
            Self::Flags(flags) => flags
                .into_iter()
                .filter(|(_, present)| *present)
                .map(|(class, _)| class)
                .collect(),
            Self::List(list) => list.into_iter().collect(),
        }
    }
}

/// Immutable subtype resolver
#[derive(Debug, Clone, Default)]
pub struct DatatypeRegistry {
    ext_to_class: HashMap<String, String>,
    class_to_ancestors: HashMap<String, HashSet<String>>,
}

impl DatatypeRegistry {
    /// Create an empty registry (no extension is a subtype of anything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON payload of the datatype service
    pub fn from_json(json: &str) -> Result<Self> {
        let table: DatatypeTable = serde_json::from_str(json)?;
        Ok(Self::from(table))
    }

    /// Register an extension and its class
    pub fn with_extension(mut self, extension: impl Into<String>, class: impl Into<String>) -> Self {
        self.ext_to_class.insert(extension.into(), class.into());
        self
    }

    /// Register a class and the classes it derives from
    ///
    /// The class itself is always part of its own ancestor set.
    pub fn with_class<I, S>(mut self, class: impl Into<String>, ancestors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let class = class.into();
        let mut set: HashSet<String> = ancestors.into_iter().map(Into::into).collect();
        set.insert(class.clone());
        self.class_to_ancestors.insert(class, set);
        self
    }

    /// Class name for an extension
    pub fn class_of(&self, extension: &str) -> Option<&str> {
        self.ext_to_class.get(extension).map(String::as_str)
    }

    /// Whether `child` is `parent` or a specialisation of it
    ///
    /// Holds iff the class of `parent` is in the ancestor set of the class
    /// of `child`. Unknown extensions are never subtypes.
    pub fn is_subtype(&self, child: &str, parent: &str) -> bool {
        let (Some(child_class), Some(parent_class)) = (self.class_of(child), self.class_of(parent))
        else {
            return false;
        };
        self.class_to_ancestors
            .get(child_class)
            .is_some_and(|ancestors| ancestors.contains(parent_class))
    }

    pub fn extension_count(&self) -> usize {
        self.ext_to_class.len()
    }
}

impl From<DatatypeTable> for DatatypeRegistry {
    fn from(table: DatatypeTable) -> Self {
        let class_to_ancestors = table
            .class_to_classes
            .into_iter()
            .map(|(class, ancestors)| {
                let mut set = ancestors.into_set();
                set.insert(class.clone());
                (class, set)
            })
            .collect();
        Self {
            ext_to_class: table.ext_to_class_name,
            class_to_ancestors,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_registry() -> DatatypeRegistry {
    DatatypeRegistry::new()
        .with_extension("data", "galaxy.datatypes.data.Data")
        .with_extension("txt", "galaxy.datatypes.data.Text")
        .with_extension("tabular", "galaxy.datatypes.tabular.Tabular")
        .with_extension("interval", "galaxy.datatypes.interval.Interval")
        .with_extension("bed", "galaxy.datatypes.interval.Bed")
        .with_extension("fasta", "galaxy.datatypes.sequence.Fasta")
        .with_class("galaxy.datatypes.data.Data", Vec::<String>::new())
        .with_class("galaxy.datatypes.data.Text", ["galaxy.datatypes.data.Data"])
        .with_class(
            "galaxy.datatypes.tabular.Tabular",
            ["galaxy.datatypes.data.Text", "galaxy.datatypes.data.Data"],
        )
        .with_class(
            "galaxy.datatypes.interval.Interval",
            [
                "galaxy.datatypes.tabular.Tabular",
                "galaxy.datatypes.data.Text",
                "galaxy.datatypes.data.Data",
            ],
        )
        .with_class(
            "galaxy.datatypes.interval.Bed",
            [
                "galaxy.datatypes.interval.Interval",
                "galaxy.datatypes.tabular.Tabular",
                "galaxy.datatypes.data.Text",
                "galaxy.datatypes.data.Data",
            ],
        )
        .with_class(
            "galaxy.datatypes.sequence.Fasta",
            ["galaxy.datatypes.data.Text", "galaxy.datatypes.data.Data"],
        )
}
