// Live state rendered back into the name-keyed document format
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::{
    catalog::Catalog,
    error::SyncError,
    policy::{
        Attributes, Domain,
        domain::Selector,
        model::{NAME, STACK_DEFAULT_SET, STACK_SETS, object_id, object_name, strip_decoration},
    },
    store::{Collection, PolicyStore},
};

/// Export one domain's Sets (with Rules) and Stacks as a document section map
pub async fn export_domain<S: PolicyStore + ?Sized>(
    store: &S,
    domain: Domain,
) -> Result<Map<String, Value>, SyncError> {
    let catalog = Catalog::load(store, domain).await;
    render_domain(&catalog)
}

/// Export every selected domain into one document
pub async fn export<S: PolicyStore + ?Sized>(
    store: &S,
    selector: Selector,
) -> Result<Map<String, Value>, SyncError> {
    let mut document = Map::new();
    for domain in selector.domains() {
        document.extend(export_domain(store, domain).await?);
    }
    Ok(document)
}

pub fn render_domain(catalog: &Catalog) -> Result<Map<String, Value>, SyncError> {
    let domain = catalog.domain();
    let descriptor = domain.descriptor();
    for (known, collection) in [
        (catalog.sets_known(), descriptor.sets),
        (catalog.stacks_known(), descriptor.stacks),
    ] {
        if !known {
            return Err(SyncError::ExportIncomplete {
                collection: collection.to_string(),
            });
        }
    }

    let mut sets = Vec::new();
    for live in catalog.live_sets() {
        let Some(name) = object_name(live) else {
            continue;
        };
        let rules = catalog
            .live_rules(name)
            .ok_or_else(|| SyncError::ExportIncomplete {
                collection: match object_id(live) {
                    Some(set_id) => Collection::rules(domain, set_id).path(),
                    None => descriptor.sets.to_string(),
                },
            })?;

        let mut rule_names = HashMap::new();
        let mut wrapped_rules = Vec::with_capacity(rules.len());
        for rule in rules {
            let Some(rule_name) = object_name(rule) else {
                continue;
            };
            if let Some(rule_id) = object_id(rule) {
                rule_names.insert(rule_id.to_string(), rule_name.to_string());
            }
            let translated = catalog.to_names(rule);
            wrapped_rules.push(wrap(rule_name, translated.value));
        }

        let mut attributes = live.clone();
        for field in descriptor.order_fields {
            if let Some(Value::Array(ids)) = attributes.get_mut(*field) {
                for id in ids.iter_mut() {
                    let Value::String(rule_id) = id else {
                        continue;
                    };
                    match rule_names.get(rule_id.as_str()) {
                        Some(rule_name) => *rule_id = rule_name.clone(),
                        None => log::warn!(
                            "{}: set '{}' orders unknown rule id '{}' in {}",
                            descriptor.label,
                            name,
                            rule_id,
                            field
                        ),
                    }
                }
            }
        }
        attributes.insert(descriptor.rules.to_string(), Value::Array(wrapped_rules));
        sets.push(wrap(name, attributes));
    }

    let mut stacks = Vec::new();
    for live in catalog.live_stacks() {
        let Some(name) = object_name(live) else {
            continue;
        };
        let mut attributes = live.clone();
        if let Some(Value::Array(ids)) = attributes.get_mut(STACK_SETS) {
            for id in ids.iter_mut() {
                set_id_to_name(catalog, name, id);
            }
        }
        if let Some(id) = attributes.get_mut(STACK_DEFAULT_SET) {
            set_id_to_name(catalog, name, id);
        }
        stacks.push(wrap(name, attributes));
    }

    let mut section = Map::new();
    section.insert(descriptor.sets.to_string(), Value::Array(sets));
    section.insert(descriptor.stacks.to_string(), Value::Array(stacks));
    Ok(section)
}

fn set_id_to_name(catalog: &Catalog, stack_name: &str, value: &mut Value) {
    let Value::String(set_id) = value else {
        return;
    };
    match catalog.set_name(set_id) {
        Some(set_name) => *set_id = set_name.to_string(),
        None => log::warn!(
            "{}: stack '{}' references unknown set id '{}'",
            catalog.domain().descriptor().label,
            stack_name,
            set_id
        ),
    }
}

/// `{name: {attributes}}` with decoration, id and name removed
fn wrap(name: &str, mut attributes: Attributes) -> Value {
    strip_decoration(&mut attributes);
    attributes.remove(NAME);
    let mut wrapper = Map::new();
    wrapper.insert(name.to_string(), Value::Object(attributes));
    Value::Object(wrapper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        policy::{InventoryKind, PolicyDocument},
        reconcile::reconcile,
        store::{MockPolicyStore, memory::MemoryStore},
    };
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn nat_catalog() -> Catalog {
        let mut catalog = Catalog::new(Domain::Nat);
        catalog.table_mut(InventoryKind::NatZones).insert("z-1", "Internet");
        catalog.add_set(
            attrs(json!({
                "id": "s-1",
                "_etag": 3,
                "name": "Outbound",
                "source_zone_policyrule_order": ["r-1", "r-gone"],
                "destination_zone_policyrule_order": null
            })),
            Some(vec![attrs(json!({
                "id": "r-1",
                "name": "Masquerade",
                "source_zone_id": "z-1",
                "actions": [{"type": "source_nat_dynamic"}]
            }))]),
        );
        catalog.add_stack(attrs(json!({
            "id": "k-1",
            "name": "Branch",
            "policyset_ids": ["s-1"],
            "default_policysetstack": true
        })));
        catalog
    }

    #[test]
    fn renders_names_everywhere() {
        let section = render_domain(&nat_catalog()).unwrap();

        assert_eq!(
            section["natpolicysets"],
            json!([{"Outbound": {
                "source_zone_policyrule_order": ["Masquerade", "r-gone"],
                "destination_zone_policyrule_order": null,
                "natpolicyrules": [{"Masquerade": {
                    "source_zone_id": "Internet",
                    "actions": [{"type": "Source NAT"}]
                }}]
            }}])
        );
        assert_eq!(
            section["natpolicysetstacks"],
            json!([{"Branch": {
                "policyset_ids": ["Outbound"],
                "default_policysetstack": true
            }}])
        );
    }

    #[test]
    fn unreadable_rules_abort_the_export() {
        let mut catalog = Catalog::new(Domain::Qos);
        catalog.add_set(attrs(json!({"id": "s-1", "name": "Voice"})), None);
        let err = render_domain(&catalog).unwrap_err();
        assert!(matches!(err, SyncError::ExportIncomplete { .. }));
    }

    #[tokio::test]
    async fn unreadable_stack_list_aborts_the_export() {
        let mut store = MockPolicyStore::new();
        store.expect_list().returning(|collection| match collection {
            Collection::Stacks(_) => Err(SyncError::Remote {
                collection: collection.path(),
                status: 503,
                body: "unavailable".to_string(),
            }),
            _ => Ok(vec![]),
        });

        let err = export_domain(&store, Domain::Nat).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::ExportIncomplete { collection } if collection == "natpolicysetstacks"
        ));
    }

    #[tokio::test]
    async fn pushing_an_export_is_a_no_op() {
        let store = MemoryStore::new();
        store.insert(
            &Collection::Inventory(InventoryKind::Applications),
            attrs(json!({"id": "app-443", "display_name": "HTTPS"})),
        );
        let doc = PolicyDocument::from_value(json!({
            "perfmgmtpolicysets": [
                {"SLA": {
                    "link_health_policyrule_order": ["Web"],
                    "perfmgmtpolicyrules": [
                        {"Web": {"app_filters": {"application_ids": ["HTTPS"]}}}
                    ]
                }}
            ],
            "perfmgmtpolicysetstacks": [{"Branch": {"policyset_ids": ["SLA"]}}]
        }))
        .unwrap();
        reconcile(&store, Selector::Only(Domain::Performance), &doc).await;

        let exported = export(&store, Selector::Only(Domain::Performance)).await.unwrap();
        let rendered = serde_yaml::to_string(&exported).unwrap();
        let reloaded: Value = serde_yaml::from_str(&rendered).unwrap();
        let doc = PolicyDocument::from_value(reloaded).unwrap();

        store.reset_counters();
        let report = reconcile(&store, Selector::Only(Domain::Performance), &doc).await;

        assert!(!report.has_failures(), "{}", report);
        assert_eq!(store.writes(), 0, "{}", report);
    }
}
