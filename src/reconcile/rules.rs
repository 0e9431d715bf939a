use std::collections::{HashMap, HashSet};

use super::report::{Level, Outcome, Report};
use crate::{
    catalog::Catalog,
    diff::{diff, overlay},
    error::SyncError,
    policy::{
        Attributes, DesiredObject,
        model::{object_id, object_name},
    },
    store::{Collection, PolicyStore},
};

/// Reconcile one Set's Rules by name and return rule name -> id
///
/// Only Rules whose id is known after the pass end up in the map, so a
/// failed create silently drops out of any order list built from it.
pub async fn reconcile_rules<S: PolicyStore + ?Sized>(
    store: &S,
    catalog: &Catalog,
    set_name: &str,
    set_id: &str,
    desired: &[DesiredObject],
    live: &[Attributes],
    report: &mut Report,
) -> HashMap<String, String> {
    let domain = catalog.domain();
    let descriptor = domain.descriptor();
    let collection = Collection::rules(domain, set_id);

    let live_by_name: HashMap<&str, &Attributes> = live
        .iter()
        .filter_map(|rule| object_name(rule).map(|name| (name, rule)))
        .collect();

    let mut ids = HashMap::new();
    let mut visited = HashSet::new();

    for rule in desired {
        visited.insert(rule.name.as_str());

        let translated = catalog.to_ids(&rule.attributes);
        report.warn(domain, &rule.name, translated.warnings);
        let mut payload = translated.value;
        (descriptor.normalize_rule)(&mut payload);

        let outcome = match live_by_name.get(rule.name.as_str()) {
            Some(current) => {
                let Some(rule_id) = object_id(current) else {
                    report.record(
                        domain,
                        Level::Rule,
                        &rule.name,
                        Some(set_name),
                        Outcome::Failed("live rule carries no id".to_string()),
                    );
                    continue;
                };
                let changed = diff(&payload, current);
                if changed.is_empty() {
                    ids.insert(rule.name.clone(), rule_id.to_string());
                    Outcome::Unchanged
                } else {
                    log::debug!(
                        "{}: rule '{}' in '{}' differs in {:?}",
                        descriptor.label,
                        rule.name,
                        set_name,
                        changed
                    );
                    let body = overlay(current, &payload);
                    match store.update(&collection, rule_id, &body).await {
                        Ok(_) => {
                            ids.insert(rule.name.clone(), rule_id.to_string());
                            Outcome::Updated
                        }
                        Err(e) => Outcome::Failed(e.to_string()),
                    }
                }
            }
            None => match store.create(&collection, &payload).await {
                Ok(created) => match object_id(&created) {
                    Some(rule_id) => {
                        ids.insert(rule.name.clone(), rule_id.to_string());
                        Outcome::Created
                    }
                    None => Outcome::Failed(
                        SyncError::MissingId {
                            collection: collection.path(),
                        }
                        .to_string(),
                    ),
                },
                Err(e) => Outcome::Failed(e.to_string()),
            },
        };
        report.record(domain, Level::Rule, &rule.name, Some(set_name), outcome);
    }

    for orphan in live {
        let Some(name) = object_name(orphan) else {
            continue;
        };
        if visited.contains(name) {
            continue;
        }
        let outcome = match object_id(orphan) {
            Some(rule_id) => match store.delete(&collection, rule_id).await {
                Ok(()) => Outcome::Deleted,
                Err(e) => Outcome::Failed(e.to_string()),
            },
            None => Outcome::Failed("live rule carries no id".to_string()),
        };
        report.record(domain, Level::Rule, name, Some(set_name), outcome);
    }

    ids
}
