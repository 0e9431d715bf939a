use std::fmt;

use serde_json::Value;

use super::Catalog;
use crate::policy::{
    Attributes,
    domain::{Lookup, ReferenceField, Segment},
};

/// A translated value plus the references that could not be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct Translated<T> {
    pub value: T,
    pub warnings: Vec<TranslationWarning>,
}

/// A reference left untranslated because the catalog has no entry for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationWarning {
    pub field: String,
    pub value: String,
}

impl fmt::Display for TranslationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unresolved reference '{}' in {}", self.value, self.field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToIds,
    ToNames,
}

impl Catalog {
    /// Replace every reference name in a desired Rule with its live id
    pub fn to_ids(&self, rule: &Attributes) -> Translated<Attributes> {
        self.translate(rule, Direction::ToIds)
    }

    /// Replace every reference id in a live Rule with its name
    pub fn to_names(&self, rule: &Attributes) -> Translated<Attributes> {
        self.translate(rule, Direction::ToNames)
    }

    fn translate(&self, rule: &Attributes, direction: Direction) -> Translated<Attributes> {
        let mut value = rule.clone();
        let mut warnings = Vec::new();
        for field in self.domain().descriptor().references {
            let Some((Segment::Key(first), rest)) = field.path.split_first() else {
                continue;
            };
            if let Some(node) = value.get_mut(*first) {
                self.walk(node, rest, field, direction, &mut warnings);
            }
        }
        Translated { value, warnings }
    }

    fn walk(
        &self,
        node: &mut Value,
        rest: &[Segment],
        field: &ReferenceField,
        direction: Direction,
        warnings: &mut Vec<TranslationWarning>,
    ) {
        match rest.split_first() {
            None => self.replace(node, field, direction, warnings),
            Some((Segment::Key(key), rest)) => {
                if let Some(child) = node.as_object_mut().and_then(|map| map.get_mut(*key)) {
                    self.walk(child, rest, field, direction, warnings);
                }
            }
            Some((Segment::Each, rest)) => {
                if let Value::Array(items) = node {
                    for item in items {
                        self.walk(item, rest, field, direction, warnings);
                    }
                }
            }
        }
    }

    fn replace(
        &self,
        node: &mut Value,
        field: &ReferenceField,
        direction: Direction,
        warnings: &mut Vec<TranslationWarning>,
    ) {
        let Value::String(current) = node else {
            return;
        };
        match self.resolve(current, field.lookup, direction) {
            Some(translated) => *current = translated,
            None => {
                log::warn!(
                    "{}: unresolved reference '{}' in {}",
                    self.domain().descriptor().label,
                    current,
                    field.describe()
                );
                warnings.push(TranslationWarning {
                    field: field.describe(),
                    value: current.clone(),
                });
            }
        }
    }

    /// Translated value; a value already in the target form resolves to itself
    fn resolve(&self, value: &str, lookup: Lookup, direction: Direction) -> Option<String> {
        match lookup {
            Lookup::Inventory(kinds) => {
                let tables = kinds.iter().filter_map(|kind| self.table(*kind));
                let mut already = false;
                for table in tables {
                    let (hit, target) = match direction {
                        Direction::ToIds => (table.id_of(value), table.name_of(value)),
                        Direction::ToNames => (table.name_of(value), table.id_of(value)),
                    };
                    if let Some(hit) = hit {
                        return Some(hit.to_string());
                    }
                    already |= target.is_some();
                }
                already.then(|| value.to_string())
            }
            Lookup::Fixed(pairs) => pairs.iter().find_map(|(id, name)| match direction {
                Direction::ToIds if *name == value || *id == value => Some((*id).to_string()),
                Direction::ToNames if *id == value || *name == value => Some((*name).to_string()),
                _ => None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Domain, InventoryKind};
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn security_catalog() -> Catalog {
        let mut catalog = Catalog::new(Domain::Security);
        catalog
            .table_mut(InventoryKind::Applications)
            .insert("app-443", "HTTPS");
        catalog
            .table_mut(InventoryKind::NgfwGlobalPrefixes)
            .insert("gp-1", "Corp-Nets");
        catalog
            .table_mut(InventoryKind::NgfwLocalPrefixes)
            .insert("lp-1", "Site-Nets");
        catalog
            .table_mut(InventoryKind::SecurityZones)
            .insert("z-1", "Internet");
        catalog
    }

    #[test]
    fn names_become_ids_across_prefix_scopes() {
        let catalog = security_catalog();
        let rule = attrs(json!({
            "name": "Allow-HTTPS",
            "app_def_ids": ["HTTPS"],
            "source_prefix_ids": ["Corp-Nets", "Site-Nets"],
            "destination_zone_ids": ["Internet"],
            "source_zone_ids": null
        }));

        let translated = catalog.to_ids(&rule);

        assert!(translated.warnings.is_empty());
        assert_eq!(translated.value["app_def_ids"], json!(["app-443"]));
        assert_eq!(translated.value["source_prefix_ids"], json!(["gp-1", "lp-1"]));
        assert_eq!(translated.value["destination_zone_ids"], json!(["z-1"]));
        assert_eq!(translated.value["source_zone_ids"], Value::Null);
    }

    #[test]
    fn misses_pass_through_with_a_warning() {
        let catalog = security_catalog();
        let rule = attrs(json!({"app_def_ids": ["HTTPS", "Gopher"]}));

        let translated = catalog.to_ids(&rule);

        assert_eq!(translated.value["app_def_ids"], json!(["app-443", "Gopher"]));
        assert_eq!(
            translated.warnings,
            vec![TranslationWarning {
                field: "app_def_ids[]".to_string(),
                value: "Gopher".to_string()
            }]
        );
    }

    #[test]
    fn ids_are_left_alone_without_warning() {
        let catalog = security_catalog();
        let rule = attrs(json!({"app_def_ids": ["app-443"]}));
        let translated = catalog.to_ids(&rule);
        assert!(translated.warnings.is_empty());
        assert_eq!(translated.value["app_def_ids"], json!(["app-443"]));
    }

    #[test]
    fn ids_become_names() {
        let catalog = security_catalog();
        let rule = attrs(json!({"app_def_ids": ["app-443"], "source_zone_ids": ["z-1"]}));
        let translated = catalog.to_names(&rule);
        assert_eq!(translated.value["app_def_ids"], json!(["HTTPS"]));
        assert_eq!(translated.value["source_zone_ids"], json!(["Internet"]));
    }

    #[test]
    fn wan_labels_and_nat_actions() {
        let catalog = Catalog::new(Domain::Path);
        let rule = attrs(json!({
            "paths_allowed": {
                "active_paths": [{"label": "Any Public", "path_type": "direct"}],
                "backup_paths": null
            }
        }));
        let translated = catalog.to_ids(&rule);
        assert_eq!(
            translated.value["paths_allowed"]["active_paths"][0]["label"],
            "public-*"
        );

        let catalog = Catalog::new(Domain::Nat);
        let rule = attrs(json!({"actions": [{"type": "Source NAT", "nat_pool_id": null}]}));
        let translated = catalog.to_ids(&rule);
        assert!(translated.warnings.is_empty());
        assert_eq!(translated.value["actions"][0]["type"], "source_nat_dynamic");
        let back = catalog.to_names(&translated.value);
        assert_eq!(back.value["actions"][0]["type"], "Source NAT");
    }
}
