use std::collections::HashMap;

use super::{
    report::{Level, Outcome, Report},
    sets::{prune_sets, reconcile_sets, skip_rules},
    stacks::{prune_stacks, reconcile_stacks},
};
use crate::{
    catalog::Catalog,
    error::SyncError,
    policy::{Domain, PolicyDocument, domain::Selector},
    store::PolicyStore,
};

/// Reconcile one domain against a fresh catalog
///
/// Sets go first since Stacks reference them by id. Orphaned Stacks are
/// removed before orphaned Sets so no deleted Set is still referenced.
/// A section absent from the document leaves that object kind untouched, and
/// so does a kind whose live list could not be read.
pub async fn reconcile_domain<S: PolicyStore + ?Sized>(
    store: &S,
    domain: Domain,
    document: &PolicyDocument,
) -> Result<Report, SyncError> {
    let descriptor = domain.descriptor();
    let mut report = Report::new();

    if !document.has_domain(domain) {
        log::debug!("{}: not present in the document, skipping", descriptor.label);
        return Ok(report);
    }
    let sets = document.sets(domain)?;
    let stacks = document.stacks(domain)?;

    log::info!("{}: reconciling", descriptor.label);
    let catalog = Catalog::load(store, domain).await;

    let fresh_sets = match &sets {
        Some(sets) if catalog.sets_known() => {
            reconcile_sets(store, &catalog, sets, &mut report).await
        }
        Some(sets) => {
            for set in sets {
                unknown(&mut report, domain, Level::Set, &set.name, descriptor.sets);
                skip_rules(&mut report, domain, set);
            }
            HashMap::new()
        }
        None => HashMap::new(),
    };
    if let Some(stacks) = &stacks {
        if catalog.stacks_known() && catalog.sets_known() {
            reconcile_stacks(store, &catalog, stacks, &fresh_sets, &mut report).await;
        } else {
            // member ids cannot be resolved without the live Sets
            let missing = if catalog.stacks_known() {
                descriptor.sets
            } else {
                descriptor.stacks
            };
            for stack in stacks {
                unknown(&mut report, domain, Level::Stack, &stack.name, missing);
            }
        }
        if catalog.stacks_known() {
            prune_stacks(store, &catalog, stacks, &mut report).await;
        }
    }
    if let Some(sets) = &sets {
        if catalog.sets_known() {
            prune_sets(store, &catalog, sets, &mut report).await;
        }
    }

    Ok(report)
}

fn unknown(report: &mut Report, domain: Domain, level: Level, name: &str, collection: &str) {
    report.record(
        domain,
        level,
        name,
        None,
        Outcome::Failed(format!("live {} could not be read", collection)),
    );
}

/// Reconcile the selected domains one after another, each with its own catalog
pub async fn reconcile<S: PolicyStore + ?Sized>(
    store: &S,
    selector: Selector,
    document: &PolicyDocument,
) -> Report {
    let mut report = Report::new();
    for domain in selector.domains() {
        match reconcile_domain(store, domain, document).await {
            Ok(domain_report) => report.merge(domain_report),
            Err(e) => report.record(
                domain,
                Level::Domain,
                domain.descriptor().label,
                None,
                Outcome::Failed(e.to_string()),
            ),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        policy::{Attributes, InventoryKind},
        store::{Collection, MockPolicyStore, memory::MemoryStore},
    };
    use serde_json::{Value, json};
    use std::sync::atomic::Ordering;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn document(value: Value) -> PolicyDocument {
        PolicyDocument::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn new_security_set_with_translated_rule() {
        let mut store = MockPolicyStore::new();
        store.expect_list().returning(|collection| match collection {
            Collection::Inventory(InventoryKind::Applications) => {
                Ok(vec![attrs(json!({"id": "app-443", "display_name": "HTTPS"}))])
            }
            _ => Ok(vec![]),
        });
        store
            .expect_create()
            .times(1)
            .withf(|collection, body| {
                *collection == Collection::Sets(Domain::Security)
                    && body["name"] == "Corp-Security"
                    && body["clone_from"].is_null()
            })
            .returning(|_, body| {
                let mut created = body.clone();
                created.insert("id".to_string(), json!("s-1"));
                Ok(created)
            });
        store
            .expect_create()
            .times(1)
            .withf(|collection, body| {
                *collection == Collection::rules(Domain::Security, "s-1")
                    && body["app_def_ids"] == json!(["app-443"])
            })
            .returning(|_, body| {
                let mut created = body.clone();
                created.insert("id".to_string(), json!("r-1"));
                Ok(created)
            });
        store.expect_update().never();
        store.expect_delete().never();

        let doc = document(json!({
            "ngfwsecuritypolicysets": [
                {"Corp-Security": {
                    "ngfwsecuritypolicyrules": [
                        {"Allow-HTTPS": {"action": "allow", "app_def_ids": ["HTTPS"]}}
                    ]
                }}
            ]
        }));

        let report = reconcile_domain(&store, Domain::Security, &doc).await.unwrap();

        assert_eq!(report.outcome_of(Level::Set, "Corp-Security"), Some(&Outcome::Created));
        assert_eq!(report.outcome_of(Level::Rule, "Allow-HTTPS"), Some(&Outcome::Created));
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn default_nat_stack_survives_an_empty_stack_list() {
        let mut store = MockPolicyStore::new();
        store.expect_list().returning(|collection| match collection {
            Collection::Stacks(_) => Ok(vec![attrs(json!({
                "id": "k-1",
                "name": "Default NAT Stack",
                "default_policysetstack": true
            }))]),
            _ => Ok(vec![]),
        });
        store.expect_delete().never();
        store.expect_create().never();
        store.expect_update().never();

        let doc = document(json!({"natpolicysets": [], "natpolicysetstacks": []}));
        let report = reconcile_domain(&store, Domain::Nat, &doc).await.unwrap();

        assert_eq!(
            report.outcome_of(Level::Stack, "Default NAT Stack"),
            Some(&Outcome::Protected)
        );
    }

    #[tokio::test]
    async fn absent_domain_is_not_read() {
        let mut store = MockPolicyStore::new();
        store.expect_list().never();

        let doc = document(json!({"networkpolicysets": []}));
        let report = reconcile_domain(&store, Domain::Nat, &doc).await.unwrap();
        assert!(report.entries.is_empty());
    }

    #[tokio::test]
    async fn malformed_section_fails_only_its_domain() {
        let store = MemoryStore::new();
        let doc = document(json!({
            "natpolicysets": [{"A": {}, "B": {}}],
            "prioritypolicysets": [{"Voice": {"description": "voice first"}}]
        }));

        let report = reconcile(&store, Selector::All, &doc).await;

        assert!(matches!(
            report.outcome_of(Level::Domain, "NAT"),
            Some(Outcome::Failed(_))
        ));
        assert_eq!(report.outcome_of(Level::Set, "Voice"), Some(&Outcome::Created));
    }

    #[tokio::test]
    async fn unreadable_live_lists_issue_no_writes() {
        let mut store = MockPolicyStore::new();
        store.expect_list().returning(|collection| match collection {
            Collection::Sets(_) | Collection::Stacks(_) => Err(SyncError::Remote {
                collection: collection.path(),
                status: 503,
                body: "unavailable".to_string(),
            }),
            _ => Ok(vec![]),
        });
        store.expect_create().never();
        store.expect_update().never();
        store.expect_delete().never();

        let doc = document(json!({
            "ngfwsecuritypolicysets": [
                {"Corp": {"ngfwsecuritypolicyrules": [{"Allow": {"action": "allow"}}]}}
            ],
            "ngfwsecuritypolicysetstacks": [{"Branch": {"policyset_ids": ["Corp"]}}]
        }));
        let report = reconcile_domain(&store, Domain::Security, &doc).await.unwrap();

        assert!(report.has_failures());
        assert!(matches!(
            report.outcome_of(Level::Set, "Corp"),
            Some(Outcome::Failed(_))
        ));
        assert!(matches!(
            report.outcome_of(Level::Stack, "Branch"),
            Some(Outcome::Failed(_))
        ));
        assert_eq!(report.outcome_of(Level::Rule, "Allow"), Some(&Outcome::Skipped));
    }

    #[tokio::test]
    async fn unreadable_sets_hold_back_stack_writes_only() {
        let mut store = MockPolicyStore::new();
        store.expect_list().returning(|collection| match collection {
            Collection::Sets(_) => Err(SyncError::Remote {
                collection: collection.path(),
                status: 503,
                body: "unavailable".to_string(),
            }),
            Collection::Stacks(_) => Ok(vec![attrs(json!({"id": "k-9", "name": "Legacy"}))]),
            _ => Ok(vec![]),
        });
        store.expect_create().never();
        store.expect_update().never();
        store
            .expect_delete()
            .times(1)
            .withf(|collection, id| *collection == Collection::Stacks(Domain::Qos) && id == "k-9")
            .returning(|_, _| Ok(()));

        let doc = document(json!({
            "prioritypolicysets": [{"Voice": {}}],
            "prioritypolicysetstacks": [{"Branch": {"policyset_ids": ["Voice"]}}]
        }));
        let report = reconcile_domain(&store, Domain::Qos, &doc).await.unwrap();

        assert!(matches!(
            report.outcome_of(Level::Stack, "Branch"),
            Some(Outcome::Failed(_))
        ));
        assert_eq!(report.outcome_of(Level::Stack, "Legacy"), Some(&Outcome::Deleted));
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(
            &Collection::Inventory(InventoryKind::Applications),
            attrs(json!({"id": "app-443", "display_name": "HTTPS"})),
        );
        store.insert(
            &Collection::Inventory(InventoryKind::Applications),
            attrs(json!({"id": "app-p2p", "display_name": "BitTorrent"})),
        );
        store.insert(
            &Collection::Inventory(InventoryKind::SecurityZones),
            attrs(json!({"id": "z-1", "name": "Internet"})),
        );
        store
    }

    fn security_document() -> PolicyDocument {
        document(json!({
            "ngfwsecuritypolicysets": [
                {"Corp-Security": {
                    "description": "corporate",
                    "policyrule_order": ["Block-P2P", "Ghost", "Allow-HTTPS"],
                    "ngfwsecuritypolicyrules": [
                        {"Allow-HTTPS": {
                            "action": "allow",
                            "app_def_ids": ["HTTPS"],
                            "destination_zone_ids": ["Internet"]
                        }},
                        {"Block-P2P": {"action": "deny", "app_def_ids": ["BitTorrent"]}}
                    ]
                }}
            ],
            "ngfwsecuritypolicysetstacks": [
                {"Branch (Simple)": {
                    "description": "branch",
                    "policyset_ids": ["Corp-Security"]
                }}
            ]
        }))
    }

    #[tokio::test]
    async fn second_run_issues_no_writes() {
        let store = seeded_store();
        let doc = security_document();

        let first = reconcile(&store, Selector::Only(Domain::Security), &doc).await;
        assert!(!first.has_failures(), "{}", first);
        assert!(store.writes() > 0);

        store.reset_counters();
        let second = reconcile(&store, Selector::Only(Domain::Security), &doc).await;

        assert!(!second.has_failures(), "{}", second);
        assert_eq!(store.writes(), 0, "{}", second);
        assert_eq!(second.summary().unchanged, 4);
    }

    #[tokio::test]
    async fn order_lists_only_hold_existing_rules() {
        let store = seeded_store();
        reconcile(&store, Selector::Only(Domain::Security), &security_document()).await;

        let sets = store.objects(&Collection::Sets(Domain::Security));
        let set = &sets[0];
        let set_id = set["id"].as_str().unwrap();
        let rules = store.objects(&Collection::rules(Domain::Security, set_id));
        let id_of = |name: &str| {
            rules
                .iter()
                .find(|rule| rule["name"] == name)
                .map(|rule| rule["id"].clone())
                .unwrap()
        };

        assert_eq!(
            set["policyrule_order"],
            Value::Array(vec![id_of("Block-P2P"), id_of("Allow-HTTPS")])
        );

        let stacks = store.objects(&Collection::Stacks(Domain::Security));
        assert_eq!(stacks[0]["policyset_ids"], json!([set_id]));
    }

    #[tokio::test]
    async fn orphans_are_deleted_once_and_defaults_kept() {
        let store = seeded_store();
        let sets = Collection::Sets(Domain::Security);
        let stacks = Collection::Stacks(Domain::Security);
        let old_set = store.insert(&sets, attrs(json!({"name": "Old"})));
        store.insert(
            &Collection::rules(Domain::Security, &old_set),
            attrs(json!({"name": "Old-Rule"})),
        );
        store.insert(
            &sets,
            attrs(json!({"name": "Branch Default Rule Policy Set (Simple)", "defaultrule_policyset": true})),
        );
        store.insert(&stacks, attrs(json!({"name": "Old Stack", "policyset_ids": [old_set]})));
        store.insert(
            &stacks,
            attrs(json!({"name": "Default Stack", "default_policysetstack": true})),
        );

        let report = reconcile(&store, Selector::Only(Domain::Security), &security_document()).await;

        assert!(!report.has_failures(), "{}", report);
        assert_eq!(store.deletes.load(Ordering::SeqCst), 2);
        assert_eq!(report.outcome_of(Level::Set, "Old"), Some(&Outcome::Deleted));
        assert_eq!(report.outcome_of(Level::Stack, "Old Stack"), Some(&Outcome::Deleted));
        assert_eq!(
            report.outcome_of(Level::Set, "Branch Default Rule Policy Set (Simple)"),
            Some(&Outcome::Protected)
        );
        assert_eq!(
            report.outcome_of(Level::Stack, "Default Stack"),
            Some(&Outcome::Protected)
        );

        let positions: Vec<usize> = ["Old Stack", "Old"]
            .iter()
            .map(|name| {
                report
                    .entries
                    .iter()
                    .position(|entry| entry.name == *name && entry.outcome == Outcome::Deleted)
                    .unwrap()
            })
            .collect();
        assert!(positions[0] < positions[1]);
    }

    #[tokio::test]
    async fn stack_default_set_follows_the_derived_name() {
        let store = seeded_store();
        let sets = Collection::Sets(Domain::Security);
        let default_id = store.insert(
            &sets,
            attrs(json!({"name": "Branch Default Rule Policy Set (Simple)", "defaultrule_policyset": true})),
        );
        let doc = document(json!({
            "ngfwsecuritypolicysetstacks": [
                {"Branch (Simple)": {"defaultrule_policyset_id": "stale-id-from-export"}}
            ]
        }));

        reconcile(&store, Selector::Only(Domain::Security), &doc).await;

        let stacks = store.objects(&Collection::Stacks(Domain::Security));
        assert_eq!(stacks[0]["defaultrule_policyset_id"], json!(default_id));
        // the set section is absent, so nothing was pruned
        assert_eq!(store.deletes.load(Ordering::SeqCst), 0);
    }
}
