use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::report::{Level, Outcome, Report};
use crate::{
    catalog::{Catalog, TranslationWarning},
    diff::{diff, overlay},
    policy::{
        Attributes, DesiredObject,
        model::{
            DEFAULT_STACK_FLAG, STACK_DEFAULT_SET, STACK_SETS, is_flagged, object_id, object_name,
        },
    },
    store::{Collection, PolicyStore},
};

/// Reconcile a domain's Stacks against the Set ids produced this run
pub async fn reconcile_stacks<S: PolicyStore + ?Sized>(
    store: &S,
    catalog: &Catalog,
    desired: &[DesiredObject],
    fresh_sets: &HashMap<String, String>,
    report: &mut Report,
) {
    let domain = catalog.domain();
    let descriptor = domain.descriptor();
    let stacks = Collection::Stacks(domain);

    for stack in desired {
        let mut warnings = Vec::new();
        let payload = resolve_stack(catalog, stack, fresh_sets, &mut warnings);
        report.warn(domain, &stack.name, warnings);

        let outcome = match catalog.live_stack(&stack.name) {
            Some(live) => match object_id(live) {
                Some(stack_id) => {
                    let changed = diff(&payload, live);
                    if changed.is_empty() {
                        Outcome::Unchanged
                    } else {
                        log::debug!(
                            "{}: stack '{}' differs in {:?}",
                            descriptor.label,
                            stack.name,
                            changed
                        );
                        let body = overlay(live, &payload);
                        match store.update(&stacks, stack_id, &body).await {
                            Ok(_) => Outcome::Updated,
                            Err(e) => Outcome::Failed(e.to_string()),
                        }
                    }
                }
                None => Outcome::Failed("live stack carries no id".to_string()),
            },
            None => match store.create(&stacks, &payload).await {
                Ok(_) => Outcome::Created,
                Err(e) => Outcome::Failed(e.to_string()),
            },
        };
        report.record(domain, Level::Stack, &stack.name, None, outcome);
    }
}

/// Desired Stack payload with member and default Set names replaced by ids
fn resolve_stack(
    catalog: &Catalog,
    stack: &DesiredObject,
    fresh_sets: &HashMap<String, String>,
    warnings: &mut Vec<TranslationWarning>,
) -> Attributes {
    let lookup = |name: &str| -> Option<String> {
        fresh_sets
            .get(name)
            .cloned()
            .or_else(|| catalog.set_id(name).map(str::to_string))
    };
    // a raw live id is mapped back to its name so a recreated Set still resolves
    let by_name_or_id = |value: &str| -> Option<String> {
        let name = catalog.set_name(value).unwrap_or(value);
        lookup(name)
    };

    let mut payload = stack.attributes.clone();

    if let Some(Value::Array(members)) = payload.get(STACK_SETS) {
        let resolved: Vec<Value> = members
            .iter()
            .filter_map(Value::as_str)
            .map(|member| match by_name_or_id(member) {
                Some(id) => Value::String(id),
                None => {
                    log::warn!(
                        "{}: stack '{}' references unknown set '{}'",
                        catalog.domain().descriptor().label,
                        stack.name,
                        member
                    );
                    warnings.push(TranslationWarning {
                        field: STACK_SETS.to_string(),
                        value: member.to_string(),
                    });
                    Value::String(member.to_string())
                }
            })
            .collect();
        let members = if resolved.is_empty() {
            Value::Null
        } else {
            Value::Array(resolved)
        };
        payload.insert(STACK_SETS.to_string(), members);
    }

    let derived = catalog
        .domain()
        .descriptor()
        .default_set
        .derive(&stack.name);
    match payload.get(STACK_DEFAULT_SET).cloned() {
        Some(Value::String(reference)) => {
            let resolved = by_name_or_id(&reference).or_else(|| {
                derived.as_deref().and_then(|name| {
                    let id = lookup(name)?;
                    log::warn!(
                        "{}: stack '{}' default set '{}' not found, using '{}'",
                        catalog.domain().descriptor().label,
                        stack.name,
                        reference,
                        name
                    );
                    Some(id)
                })
            });
            match resolved {
                Some(id) => {
                    payload.insert(STACK_DEFAULT_SET.to_string(), Value::String(id));
                }
                None => {
                    log::warn!(
                        "{}: stack '{}' references unknown default set '{}'",
                        catalog.domain().descriptor().label,
                        stack.name,
                        reference
                    );
                    warnings.push(TranslationWarning {
                        field: STACK_DEFAULT_SET.to_string(),
                        value: reference,
                    });
                }
            }
        }
        None | Some(Value::Null) => {
            if let Some(id) = derived.as_deref().and_then(|name| lookup(name)) {
                log::debug!(
                    "{}: stack '{}' gets default set '{}'",
                    catalog.domain().descriptor().label,
                    stack.name,
                    id
                );
                payload.insert(STACK_DEFAULT_SET.to_string(), Value::String(id));
            }
        }
        Some(_) => {}
    }

    payload
}

/// Delete live Stacks absent from the desired list; the default Stack is never deleted
pub async fn prune_stacks<S: PolicyStore + ?Sized>(
    store: &S,
    catalog: &Catalog,
    desired: &[DesiredObject],
    report: &mut Report,
) {
    let domain = catalog.domain();
    let stacks = Collection::Stacks(domain);
    let wanted: HashSet<&str> = desired.iter().map(|stack| stack.name.as_str()).collect();

    for live in catalog.live_stacks() {
        let Some(name) = object_name(live) else {
            continue;
        };
        if wanted.contains(name) {
            continue;
        }
        let outcome = if is_flagged(live, DEFAULT_STACK_FLAG) {
            Outcome::Protected
        } else {
            match object_id(live) {
                Some(stack_id) => match store.delete(&stacks, stack_id).await {
                    Ok(()) => Outcome::Deleted,
                    Err(e) => Outcome::Failed(e.to_string()),
                },
                None => Outcome::Failed("live stack carries no id".to_string()),
            }
        };
        report.record(domain, Level::Stack, name, None, outcome);
    }
}
