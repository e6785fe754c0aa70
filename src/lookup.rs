// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Layered property and item tables consulted during expansion.
//!
//! Scopes are shared through `Rc`; pushing a scope never copies the
//! tables underneath it.

use crate::item::{Item, MetadataTable};
use crate::Rc;

use core::fmt;

use indexmap::IndexMap;
use serde::Deserialize;

/// Names are matched with ASCII case folding.
fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// One layer of properties and items. Values are stored escaped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "ScopeSpec")]
pub struct Scope {
    properties: IndexMap<String, Rc<str>>,
    items: IndexMap<String, Vec<Rc<Item>>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_property(&mut self, name: &str, value_escaped: &str) {
        self.properties
            .insert(key(name), value_escaped.into());
    }

    pub fn with_property(mut self, name: &str, value_escaped: &str) -> Self {
        self.set_property(name, value_escaped);
        self
    }

    pub fn add_item(&mut self, item: Item) {
        self.items
            .entry(key(item.item_type()))
            .or_default()
            .push(Rc::new(item));
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.add_item(item);
        self
    }

    pub fn property(&self, name: &str) -> Option<&Rc<str>> {
        self.properties.get(&key(name))
    }

    pub fn items(&self, item_type: &str) -> Option<&[Rc<Item>]> {
        self.items
            .get(&key(item_type))
            .map(Vec::as_slice)
    }
}

/// Properties and items visible to an expansion, innermost scope first.
#[derive(Clone, Default)]
pub struct Lookup {
    scopes: Vec<Rc<Scope>>,
    metadata: Option<Rc<dyn MetadataTable>>,
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup")
            .field("scopes", &self.scopes)
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}

impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scope(scope: Scope) -> Self {
        let mut lookup = Self::new();
        lookup.push_scope(scope);
        lookup
    }

    pub fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(Rc::new(scope));
    }

    /// Push a scope that is shared with other lookups.
    pub fn push_shared_scope(&mut self, scope: Rc<Scope>) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Option<Rc<Scope>> {
        self.scopes.pop()
    }

    /// Table answering `%(Name)` references outside item transforms.
    pub fn set_metadata_table(&mut self, table: Option<Rc<dyn MetadataTable>>) {
        self.metadata = table;
    }

    pub fn metadata_table(&self) -> Option<&dyn MetadataTable> {
        self.metadata.as_deref()
    }

    /// Escaped value of a property; inner scopes shadow outer ones.
    pub fn get_property(&self, name: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.property(name))
            .map(|v| v.as_ref())
    }

    /// Items of a type from the innermost scope that defines the type.
    pub fn get_items(&self, item_type: &str) -> &[Rc<Item>] {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.items(item_type))
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemSpec {
    Include(String),
    Detailed {
        include: String,
        #[serde(default)]
        metadata: IndexMap<String, String>,
        #[serde(default)]
        defining_project: Option<String>,
    },
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ScopeSpec {
    properties: IndexMap<String, String>,
    items: IndexMap<String, Vec<ItemSpec>>,
}

impl From<ScopeSpec> for Scope {
    fn from(spec: ScopeSpec) -> Self {
        let mut scope = Scope::new();
        for (name, value) in &spec.properties {
            scope.set_property(name, value);
        }
        for (item_type, items) in spec.items {
            for item in items {
                scope.add_item(match item {
                    ItemSpec::Include(include) => Item::new(&item_type, &include),
                    ItemSpec::Detailed {
                        include,
                        metadata,
                        defining_project,
                    } => metadata.iter().fold(
                        Item::new(&item_type, &include)
                            .with_defining_project(defining_project.as_deref()),
                        |item, (name, value)| item.with_metadata(name, value),
                    ),
                });
            }
        }
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_shadow_outer() {
        let mut lookup = Lookup::from_scope(
            Scope::new()
                .with_property("A", "outer")
                .with_property("B", "b")
                .with_item(Item::new("I", "x")),
        );
        lookup.push_scope(Scope::new().with_property("a", "inner"));
        assert_eq!(lookup.get_property("A"), Some("inner"));
        assert_eq!(lookup.get_property("b"), Some("b"));
        assert_eq!(lookup.get_property("C"), None);
        assert_eq!(lookup.get_items("i").len(), 1);
        assert!(lookup.get_items("J").is_empty());

        lookup.pop_scope();
        assert_eq!(lookup.get_property("A"), Some("outer"));
    }

    #[test]
    fn shared_scopes_are_not_copied() {
        let shared = Rc::new(Scope::new().with_property("P", "v"));
        let mut a = Lookup::new();
        let mut b = Lookup::new();
        a.push_shared_scope(shared.clone());
        b.push_shared_scope(shared.clone());
        assert_eq!(Rc::strong_count(&shared), 3);
        assert_eq!(a.get_property("p"), b.get_property("p"));
    }
}
