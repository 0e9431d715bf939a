use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};

use super::{
    domain::Domain,
    model::{
        Attributes, DEFAULT_SET_FLAG, DEFAULT_STACK_FLAG, DesiredObject, DesiredSet, NAME,
        strip_decoration,
    },
};
use crate::error::SyncError;

/// Name-keyed desired state, one section per collection (`natpolicysets`, ...)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDocument {
    sections: Map<String, Value>,
}

impl PolicyDocument {
    /// Load a YAML policy document
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content = fs::read_to_string(path)?;
        let value: Value =
            serde_yaml::from_str(&content).map_err(|source| SyncError::DocumentParse {
                path: PathBuf::from(path),
                source,
            })?;
        Self::from_value(value)
    }

    /// Accepts either one mapping of sections or a list of such mappings
    pub fn from_value(value: Value) -> Result<Self, SyncError> {
        let mut sections = Map::new();
        match value {
            Value::Null => {}
            Value::Object(map) => merge_sections(&mut sections, map),
            Value::Array(parts) => {
                for part in parts {
                    match part {
                        Value::Object(map) => merge_sections(&mut sections, map),
                        Value::Null => {}
                        other => {
                            return Err(SyncError::DocumentShape {
                                section: "<root>".to_string(),
                                reason: format!("expected a mapping of sections, found {}", kind_of(&other)),
                            });
                        }
                    }
                }
            }
            other => {
                return Err(SyncError::DocumentShape {
                    section: "<root>".to_string(),
                    reason: format!("expected a mapping of sections, found {}", kind_of(&other)),
                });
            }
        }
        Ok(Self { sections })
    }

    /// True when the document mentions the domain's Sets or Stacks at all
    pub fn has_domain(&self, domain: Domain) -> bool {
        let descriptor = domain.descriptor();
        self.sections.contains_key(descriptor.sets) || self.sections.contains_key(descriptor.stacks)
    }

    /// Desired Sets of a domain with their Rules split out; `None` when the section is absent
    pub fn sets(&self, domain: Domain) -> Result<Option<Vec<DesiredSet>>, SyncError> {
        let descriptor = domain.descriptor();
        let Some(section) = self.sections.get(descriptor.sets) else {
            return Ok(None);
        };

        let mut sets = Vec::new();
        for object in extract(section, descriptor.sets)? {
            let DesiredObject {
                name,
                mut attributes,
            } = object;
            let rules = match attributes.remove(descriptor.rules) {
                Some(rules) => extract(&rules, &format!("{}/{}", name, descriptor.rules))?,
                None => Vec::new(),
            };
            sets.push(DesiredSet {
                name,
                attributes,
                rules,
            });
        }
        Ok(Some(sets))
    }

    /// Desired Stacks of a domain; `None` when the section is absent
    pub fn stacks(&self, domain: Domain) -> Result<Option<Vec<DesiredObject>>, SyncError> {
        let descriptor = domain.descriptor();
        match self.sections.get(descriptor.stacks) {
            Some(section) => extract(section, descriptor.stacks).map(Some),
            None => Ok(None),
        }
    }
}

fn merge_sections(into: &mut Map<String, Value>, from: Map<String, Value>) {
    for (key, value) in from {
        if let (Some(Value::Array(existing)), Value::Array(more)) = (into.get_mut(&key), &value) {
            existing.extend(more.iter().cloned());
            continue;
        }
        into.insert(key, value);
    }
}

/// Turn a list of single-key wrappers `{name: {attributes}}` into named objects
///
/// A plain mapping `{name: {attributes}, ...}` is accepted as well. The name is
/// injected into the attributes, decoration and protection flags are dropped,
/// and a repeated name replaces the earlier entry in place.
pub fn extract(section: &Value, section_name: &str) -> Result<Vec<DesiredObject>, SyncError> {
    let shape_error = |reason: String| SyncError::DocumentShape {
        section: section_name.to_string(),
        reason,
    };

    let entries: Vec<(String, Value)> = match section {
        Value::Null => Vec::new(),
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Null => continue,
                    Value::Object(wrapper) if wrapper.is_empty() => continue,
                    Value::Object(wrapper) if wrapper.len() == 1 => {
                        if let Some((name, body)) = wrapper.iter().next() {
                            entries.push((name.clone(), body.clone()));
                        }
                    }
                    Value::Object(wrapper) => {
                        return Err(shape_error(format!(
                            "expected a single-key entry, found keys {:?}",
                            wrapper.keys().collect::<Vec<_>>()
                        )));
                    }
                    other => {
                        return Err(shape_error(format!(
                            "expected a single-key entry, found {}",
                            kind_of(other)
                        )));
                    }
                }
            }
            entries
        }
        other => {
            return Err(shape_error(format!(
                "expected a list of entries, found {}",
                kind_of(other)
            )));
        }
    };

    let mut objects: Vec<DesiredObject> = Vec::with_capacity(entries.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (name, body) in entries {
        let mut attributes = match body {
            Value::Null => Attributes::new(),
            Value::Object(map) => map,
            other => {
                return Err(shape_error(format!(
                    "entry '{}' must be a mapping, found {}",
                    name,
                    kind_of(&other)
                )));
            }
        };
        strip_decoration(&mut attributes);
        attributes.remove(DEFAULT_SET_FLAG);
        attributes.remove(DEFAULT_STACK_FLAG);
        attributes.insert(NAME.to_string(), Value::String(name.clone()));

        let object = DesiredObject { name, attributes };
        match positions.get(&object.name) {
            Some(&index) => {
                log::warn!(
                    "Duplicate entry '{}' in {}; the later definition wins",
                    object.name,
                    section_name
                );
                objects[index] = object;
            }
            None => {
                positions.insert(object.name.clone(), objects.len());
                objects.push(object);
            }
        }
    }

    Ok(objects)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
