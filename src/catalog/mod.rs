// Run-scoped name <-> id tables plus live snapshots of one domain
mod translate;

use std::collections::HashMap;

pub use translate::{Translated, TranslationWarning};

use crate::{
    policy::{
        Attributes, Domain, InventoryKind,
        model::{object_id, object_name},
    },
    store::{Collection, PolicyStore},
};

/// Bidirectional lookup for one inventory kind
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    id_to_name: HashMap<String, String>,
    name_to_id: HashMap<String, String>,
}

impl NameTable {
    pub fn insert(&mut self, id: &str, name: &str) {
        self.id_to_name.insert(id.to_string(), name.to_string());
        self.name_to_id.insert(name.to_string(), id.to_string());
    }

    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.name_to_id.get(name).map(String::as_str)
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.id_to_name.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.id_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_name.is_empty()
    }
}

/// Live Set together with what is known about its Rules
#[derive(Debug, Clone)]
pub struct LiveSet {
    pub object: Attributes,
    /// `None` when the rule read failed
    pub rules: Option<Vec<Attributes>>,
}

/// Translation tables and live snapshots, read once per domain run
#[derive(Debug)]
pub struct Catalog {
    domain: Domain,
    inventory: HashMap<InventoryKind, NameTable>,
    /// `None` when the Set list could not be read
    sets: Option<Vec<LiveSet>>,
    /// `None` when the Stack list could not be read
    stacks: Option<Vec<Attributes>>,
}

impl Catalog {
    pub fn new(domain: Domain) -> Self {
        let mut inventory = HashMap::new();
        for kind in domain.descriptor().inventory {
            let mut table = NameTable::default();
            for (id, name) in kind.seeded() {
                table.insert(id, name);
            }
            inventory.insert(*kind, table);
        }
        Self {
            domain,
            inventory,
            sets: Some(Vec::new()),
            stacks: Some(Vec::new()),
        }
    }

    /// Read the domain's inventory, Sets (with Rules) and Stacks
    ///
    /// Never fails: a failed inventory read is logged and leaves its table
    /// empty. A failed Set or Stack read marks that kind unknown.
    pub async fn load<S: PolicyStore + ?Sized>(store: &S, domain: Domain) -> Self {
        let mut catalog = Self::new(domain);
        let descriptor = domain.descriptor();

        for kind in descriptor.inventory {
            match store.list(&Collection::Inventory(*kind)).await {
                Ok(objects) => {
                    let table = catalog.inventory.entry(*kind).or_default();
                    for object in &objects {
                        let id = object.get(kind.id_field()).and_then(|v| v.as_str());
                        let name = object.get(kind.name_field()).and_then(|v| v.as_str());
                        if let (Some(id), Some(name)) = (id, name) {
                            table.insert(id, name);
                        }
                    }
                    log::debug!("{}: loaded {} {}", descriptor.label, table.len(), kind);
                }
                Err(e) => log::error!("{}: failed to read {}: {}", descriptor.label, kind, e),
            }
        }

        match store.list(&Collection::Sets(domain)).await {
            Ok(sets) => {
                for object in sets {
                    let rules = match object_id(&object) {
                        Some(set_id) => {
                            match store.list(&Collection::rules(domain, set_id)).await {
                                Ok(rules) => Some(rules),
                                Err(e) => {
                                    log::error!(
                                        "{}: failed to read rules of set '{}': {}",
                                        descriptor.label,
                                        object_name(&object).unwrap_or(set_id),
                                        e
                                    );
                                    None
                                }
                            }
                        }
                        None => None,
                    };
                    catalog.add_set(object, rules);
                }
            }
            Err(e) => {
                log::error!("{}: failed to read {}: {}", descriptor.label, descriptor.sets, e);
                catalog.sets = None;
            }
        }

        match store.list(&Collection::Stacks(domain)).await {
            Ok(stacks) => catalog.stacks = Some(stacks),
            Err(e) => {
                log::error!(
                    "{}: failed to read {}: {}",
                    descriptor.label,
                    descriptor.stacks,
                    e
                );
                catalog.stacks = None;
            }
        }

        catalog
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn table(&self, kind: InventoryKind) -> Option<&NameTable> {
        self.inventory.get(&kind)
    }

    pub fn table_mut(&mut self, kind: InventoryKind) -> &mut NameTable {
        self.inventory.entry(kind).or_default()
    }

    /// False when the live Set list could not be read
    pub fn sets_known(&self) -> bool {
        self.sets.is_some()
    }

    pub fn stacks_known(&self) -> bool {
        self.stacks.is_some()
    }

    pub fn live_sets(&self) -> impl Iterator<Item = &Attributes> {
        self.sets.iter().flatten().map(|set| &set.object)
    }

    pub fn live_set(&self, name: &str) -> Option<&Attributes> {
        self.find_set(name).map(|set| &set.object)
    }

    /// Live Rules of a Set; `None` when the Set is unknown or its rules were unreadable
    pub fn live_rules(&self, set_name: &str) -> Option<&[Attributes]> {
        self.find_set(set_name)
            .and_then(|set| set.rules.as_deref())
    }

    pub fn set_id(&self, name: &str) -> Option<&str> {
        self.live_set(name).and_then(object_id)
    }

    pub fn set_name(&self, id: &str) -> Option<&str> {
        self.sets
            .iter()
            .flatten()
            .find(|set| object_id(&set.object) == Some(id))
            .and_then(|set| object_name(&set.object))
    }

    pub fn live_stacks(&self) -> impl Iterator<Item = &Attributes> {
        self.stacks.iter().flatten()
    }

    pub fn live_stack(&self, name: &str) -> Option<&Attributes> {
        self.live_stacks()
            .find(|stack| object_name(stack) == Some(name))
    }

    /// Record a live Set, e.g. when seeding a catalog by hand
    pub fn add_set(&mut self, object: Attributes, rules: Option<Vec<Attributes>>) {
        self.sets
            .get_or_insert_with(Vec::new)
            .push(LiveSet { object, rules });
    }

    pub fn add_stack(&mut self, object: Attributes) {
        self.stacks.get_or_insert_with(Vec::new).push(object);
    }

    fn find_set(&self, name: &str) -> Option<&LiveSet> {
        self.sets
            .iter()
            .flatten()
            .find(|set| object_name(&set.object) == Some(name))
    }
}
