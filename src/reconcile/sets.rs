use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::{
    report::{Level, Outcome, Report},
    rules::reconcile_rules,
};
use crate::{
    catalog::Catalog,
    diff::{diff, overlay},
    error::SyncError,
    policy::{
        Attributes, DesiredSet, Domain,
        model::{CLONE_FROM, DEFAULT_SET_FLAG, ID, is_flagged, object_id, object_name},
    },
    store::{Collection, PolicyStore},
};

/// Reconcile a domain's Sets and their Rules; returns set name -> id
///
/// Order fields are withheld from the attribute write and sent afterwards
/// in a narrow update, once every Rule they name has an id.
pub async fn reconcile_sets<S: PolicyStore + ?Sized>(
    store: &S,
    catalog: &Catalog,
    desired: &[DesiredSet],
    report: &mut Report,
) -> HashMap<String, String> {
    let domain = catalog.domain();
    let descriptor = domain.descriptor();
    let sets = Collection::Sets(domain);
    let mut fresh = HashMap::new();

    for set in desired {
        let mut payload = set.attributes.clone();
        let orders: Vec<(&str, Option<Value>)> = descriptor
            .order_fields
            .iter()
            .map(|field| (*field, payload.remove(*field)))
            .collect();

        let (set_id, is_default, live_rules, mut outcome) = match catalog.live_set(&set.name) {
            Some(live) => {
                let Some(set_id) = object_id(live) else {
                    report.record(
                        domain,
                        Level::Set,
                        &set.name,
                        None,
                        Outcome::Failed("live set carries no id".to_string()),
                    );
                    continue;
                };
                let live_rules = match catalog.live_rules(&set.name) {
                    Some(rules) => rules.to_vec(),
                    None => match store.list(&Collection::rules(domain, set_id)).await {
                        Ok(rules) => rules,
                        Err(e) => {
                            report.record(
                                domain,
                                Level::Set,
                                &set.name,
                                None,
                                Outcome::Failed(format!("rules unreadable: {}", e)),
                            );
                            skip_rules(report, domain, set);
                            continue;
                        }
                    },
                };

                let changed = diff(&payload, live);
                let outcome = if changed.is_empty() {
                    Outcome::Unchanged
                } else {
                    log::debug!(
                        "{}: set '{}' differs in {:?}",
                        descriptor.label,
                        set.name,
                        changed
                    );
                    let mut body = overlay(live, &payload);
                    for field in descriptor.order_fields {
                        body.remove(*field);
                    }
                    match store.update(&sets, set_id, &body).await {
                        Ok(_) => Outcome::Updated,
                        Err(e) => Outcome::Failed(e.to_string()),
                    }
                };
                (
                    set_id.to_string(),
                    is_flagged(live, DEFAULT_SET_FLAG),
                    Some(live_rules),
                    outcome,
                )
            }
            None => {
                payload.insert(CLONE_FROM.to_string(), Value::Null);
                for field in descriptor.order_fields {
                    payload.insert(field.to_string(), Value::Null);
                }
                let created = match store.create(&sets, &payload).await {
                    Ok(created) => created,
                    Err(e) => {
                        report.record(
                            domain,
                            Level::Set,
                            &set.name,
                            None,
                            Outcome::Failed(e.to_string()),
                        );
                        skip_rules(report, domain, set);
                        continue;
                    }
                };
                let Some(set_id) = object_id(&created) else {
                    report.record(
                        domain,
                        Level::Set,
                        &set.name,
                        None,
                        Outcome::Failed(
                            SyncError::MissingId {
                                collection: sets.path(),
                            }
                            .to_string(),
                        ),
                    );
                    skip_rules(report, domain, set);
                    continue;
                };
                // the controller may synthesize rules while creating a Set
                let live_rules = match store.list(&Collection::rules(domain, set_id)).await {
                    Ok(rules) => Some(rules),
                    Err(e) => {
                        log::error!(
                            "{}: failed to re-read rules of new set '{}': {}",
                            descriptor.label,
                            set.name,
                            e
                        );
                        None
                    }
                };
                (set_id.to_string(), false, live_rules, Outcome::Created)
            }
        };

        let Some(live_rules) = live_rules else {
            skip_rules(report, domain, set);
            fresh.insert(set.name.clone(), set_id);
            report.record(domain, Level::Set, &set.name, None, outcome);
            continue;
        };

        let rule_ids = reconcile_rules(
            store,
            catalog,
            &set.name,
            &set_id,
            &set.rules,
            &live_rules,
            report,
        )
        .await;
        fresh.insert(set.name.clone(), set_id.clone());

        if is_default {
            log::debug!(
                "{}: rule order of default set '{}' is left to the controller",
                descriptor.label,
                set.name
            );
        } else if let Some(order_outcome) =
            finalize_order(store, &sets, &set_id, &orders, &rule_ids).await
        {
            outcome = match (outcome, order_outcome) {
                (Outcome::Failed(reason), _) | (_, Outcome::Failed(reason)) => {
                    Outcome::Failed(reason)
                }
                (Outcome::Created, _) => Outcome::Created,
                _ => Outcome::Updated,
            };
        }

        report.record(domain, Level::Set, &set.name, None, outcome);
    }

    fresh
}

/// Send resolved order fields in a narrow update, unless they already match
async fn finalize_order<S: PolicyStore + ?Sized>(
    store: &S,
    sets: &Collection,
    set_id: &str,
    orders: &[(&str, Option<Value>)],
    rule_ids: &HashMap<String, String>,
) -> Option<Outcome> {
    let mut body = Attributes::new();
    for (field, desired) in orders {
        let Some(Value::Array(names)) = desired else {
            continue;
        };
        let resolved: Vec<Value> = names
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|name| rule_ids.get(name))
            .map(|id| Value::String(id.clone()))
            .collect();
        body.insert(field.to_string(), Value::Array(resolved));
    }
    if body.is_empty() {
        return None;
    }

    match store.get(sets, set_id).await {
        Ok(current) if diff(&body, &current).is_empty() => return None,
        Ok(_) => {}
        Err(e) => log::debug!("could not read back {}/{}: {}", sets, set_id, e),
    }

    body.insert(ID.to_string(), Value::String(set_id.to_string()));
    Some(match store.update(sets, set_id, &body).await {
        Ok(_) => Outcome::Updated,
        Err(e) => Outcome::Failed(format!("rule order: {}", e)),
    })
}

pub(super) fn skip_rules(report: &mut Report, domain: Domain, set: &DesiredSet) {
    for rule in &set.rules {
        report.record(domain, Level::Rule, &rule.name, Some(&set.name), Outcome::Skipped);
    }
}

/// Delete live Sets absent from the desired list; default Sets are never deleted
pub async fn prune_sets<S: PolicyStore + ?Sized>(
    store: &S,
    catalog: &Catalog,
    desired: &[DesiredSet],
    report: &mut Report,
) {
    let domain = catalog.domain();
    let sets = Collection::Sets(domain);
    let wanted: HashSet<&str> = desired.iter().map(|set| set.name.as_str()).collect();

    for live in catalog.live_sets() {
        let Some(name) = object_name(live) else {
            continue;
        };
        if wanted.contains(name) {
            continue;
        }
        let outcome = if is_flagged(live, DEFAULT_SET_FLAG) {
            Outcome::Protected
        } else {
            match object_id(live) {
                Some(set_id) => match store.delete(&sets, set_id).await {
                    Ok(()) => Outcome::Deleted,
                    Err(e) => Outcome::Failed(e.to_string()),
                },
                None => Outcome::Failed("live set carries no id".to_string()),
            }
        };
        report.record(domain, Level::Set, name, None, outcome);
    }
}
