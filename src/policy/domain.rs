use std::{fmt, str::FromStr};

use serde_json::Value;

use super::model::Attributes;
use crate::error::SyncError;

/// One of the five policy domains the controller exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Path,
    Qos,
    Nat,
    Security,
    Performance,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Path,
        Domain::Qos,
        Domain::Nat,
        Domain::Security,
        Domain::Performance,
    ];

    /// Field-name table driving the generic engine for this domain
    pub fn descriptor(self) -> &'static DomainDescriptor {
        match self {
            Domain::Path => &PATH,
            Domain::Qos => &QOS,
            Domain::Nat => &NAT,
            Domain::Security => &SECURITY,
            Domain::Performance => &PERFORMANCE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Path => "path",
            Domain::Qos => "qos",
            Domain::Nat => "nat",
            Domain::Security => "security",
            Domain::Performance => "performance",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Ok(Domain::Path),
            "qos" => Ok(Domain::Qos),
            "nat" => Ok(Domain::Nat),
            "security" => Ok(Domain::Security),
            "performance" => Ok(Domain::Performance),
            _ => Err(SyncError::UnknownDomain(s.to_string())),
        }
    }
}

/// Domains picked on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    All,
    Only(Domain),
}

impl Selector {
    pub fn domains(self) -> Vec<Domain> {
        match self {
            Selector::All => Domain::ALL.to_vec(),
            Selector::Only(domain) => vec![domain],
        }
    }
}

impl FromStr for Selector {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Selector::All);
        }
        s.parse().map(Selector::Only)
    }
}

/// Shared objects referenced from inside rules, read once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryKind {
    Applications,
    NetworkContexts,
    ServiceLabels,
    WanLabels,
    NetworkGlobalPrefixes,
    NetworkLocalPrefixes,
    PriorityGlobalPrefixes,
    PriorityLocalPrefixes,
    NatGlobalPrefixes,
    NatLocalPrefixes,
    NatZones,
    NatPools,
    NgfwGlobalPrefixes,
    NgfwLocalPrefixes,
    SecurityZones,
    ThresholdProfiles,
}

impl InventoryKind {
    pub fn collection(self) -> &'static str {
        match self {
            InventoryKind::Applications => "appdefs",
            InventoryKind::NetworkContexts => "networkcontexts",
            InventoryKind::ServiceLabels => "servicelabels",
            InventoryKind::WanLabels => "waninterfacelabels",
            InventoryKind::NetworkGlobalPrefixes => "networkpolicyglobalprefixes",
            InventoryKind::NetworkLocalPrefixes => "networkpolicylocalprefixes",
            InventoryKind::PriorityGlobalPrefixes => "prioritypolicyglobalprefixes",
            InventoryKind::PriorityLocalPrefixes => "prioritypolicylocalprefixes",
            InventoryKind::NatGlobalPrefixes => "natglobalprefixes",
            InventoryKind::NatLocalPrefixes => "natlocalprefixes",
            InventoryKind::NatZones => "natzones",
            InventoryKind::NatPools => "natpolicypools",
            InventoryKind::NgfwGlobalPrefixes => "ngfwsecuritypolicyglobalprefixes",
            InventoryKind::NgfwLocalPrefixes => "ngfwsecuritypolicylocalprefixes",
            InventoryKind::SecurityZones => "securityzones",
            InventoryKind::ThresholdProfiles => "perfmgmtthresholdprofiles",
        }
    }

    /// Field holding the value rules store in live form
    pub fn id_field(self) -> &'static str {
        match self {
            InventoryKind::WanLabels => "label",
            _ => "id",
        }
    }

    /// Field holding the human name used in desired documents
    pub fn name_field(self) -> &'static str {
        match self {
            InventoryKind::Applications => "display_name",
            _ => "name",
        }
    }

    /// Pseudo-entries the controller never lists but rules may reference, as (id, name)
    pub fn seeded(self) -> &'static [(&'static str, &'static str)] {
        match self {
            InventoryKind::WanLabels => &[("public-*", "Any Public"), ("private-*", "Any Private")],
            _ => &[],
        }
    }
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// One step of a path into a rule document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Key(&'static str),
    /// Every element of a list
    Each,
}

/// Where a reference value gets translated
#[derive(Debug, Clone, Copy)]
pub enum Lookup {
    /// Inventory kinds tried in order (e.g. global prefixes before local ones)
    Inventory(&'static [InventoryKind]),
    /// Fixed (id, name) pairs known ahead of time
    Fixed(&'static [(&'static str, &'static str)]),
}

/// A rule field whose value refers to another object
#[derive(Debug, Clone, Copy)]
pub struct ReferenceField {
    pub path: &'static [Segment],
    pub lookup: Lookup,
}

impl ReferenceField {
    /// Dotted rendering used in warnings, e.g. `paths_allowed.active_paths[].label`
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for segment in self.path {
            match segment {
                Segment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                Segment::Each => out.push_str("[]"),
            }
        }
        out
    }
}

/// How a Stack locates its domain's canonical default Set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultSetName {
    None,
    /// `<stack name without " (Simple)"> Default Rule Policy Set (Simple)`
    StackSuffix,
    Fixed(&'static str),
}

const SIMPLE_SUFFIX: &str = " (Simple)";
const DEFAULT_SET_SUFFIX: &str = " Default Rule Policy Set (Simple)";

impl DefaultSetName {
    pub fn derive(&self, stack_name: &str) -> Option<String> {
        match self {
            DefaultSetName::None => None,
            DefaultSetName::StackSuffix => Some(format!(
                "{}{}",
                stack_name.replace(SIMPLE_SUFFIX, ""),
                DEFAULT_SET_SUFFIX
            )),
            DefaultSetName::Fixed(name) => Some((*name).to_string()),
        }
    }
}

/// Everything that differs between domains; the algorithms never branch on `Domain`
#[derive(Debug)]
pub struct DomainDescriptor {
    pub domain: Domain,
    pub label: &'static str,
    pub sets: &'static str,
    pub stacks: &'static str,
    /// Rule collection, nested under a Set; also the Set's rule-container key in documents
    pub rules: &'static str,
    pub order_fields: &'static [&'static str],
    pub references: &'static [ReferenceField],
    pub inventory: &'static [InventoryKind],
    pub default_set: DefaultSetName,
    pub normalize_rule: fn(&mut Attributes),
}

const APPS: Lookup = Lookup::Inventory(&[InventoryKind::Applications]);
const CONTEXTS: Lookup = Lookup::Inventory(&[InventoryKind::NetworkContexts]);
const SERVICE_LABELS: Lookup = Lookup::Inventory(&[InventoryKind::ServiceLabels]);
const WAN_LABELS: Lookup = Lookup::Inventory(&[InventoryKind::WanLabels]);
const NW_PREFIXES: Lookup = Lookup::Inventory(&[
    InventoryKind::NetworkGlobalPrefixes,
    InventoryKind::NetworkLocalPrefixes,
]);
const QOS_PREFIXES: Lookup = Lookup::Inventory(&[
    InventoryKind::PriorityGlobalPrefixes,
    InventoryKind::PriorityLocalPrefixes,
]);
const NAT_PREFIXES: Lookup = Lookup::Inventory(&[
    InventoryKind::NatGlobalPrefixes,
    InventoryKind::NatLocalPrefixes,
]);
const NGFW_PREFIXES: Lookup = Lookup::Inventory(&[
    InventoryKind::NgfwGlobalPrefixes,
    InventoryKind::NgfwLocalPrefixes,
]);

const NAT_ACTIONS: Lookup = Lookup::Fixed(&[
    ("no_nat", "No NAT"),
    ("source_nat_dynamic", "Source NAT"),
    ("destination_nat_dynamic", "Destination NAT"),
    ("source_nat_static", "Static Source NAT"),
    ("destination_nat_static", "Static Destination NAT"),
    ("alg_disable", "ALG Disable"),
]);

const fn field(path: &'static [Segment], lookup: Lookup) -> ReferenceField {
    ReferenceField { path, lookup }
}

use self::Segment::{Each, Key};

static PATH: DomainDescriptor = DomainDescriptor {
    domain: Domain::Path,
    label: "Path",
    sets: "networkpolicysets",
    stacks: "networkpolicysetstacks",
    rules: "networkpolicyrules",
    order_fields: &[],
    references: &[
        field(&[Key("network_context_id")], CONTEXTS),
        field(&[Key("source_prefixes_id")], NW_PREFIXES),
        field(&[Key("destination_prefixes_id")], NW_PREFIXES),
        field(
            &[Key("service_context"), Key("active_service_label_id")],
            SERVICE_LABELS,
        ),
        field(
            &[Key("service_context"), Key("backup_service_label_id")],
            SERVICE_LABELS,
        ),
        field(&[Key("app_def_ids"), Each], APPS),
        field(
            &[Key("paths_allowed"), Key("active_paths"), Each, Key("label")],
            WAN_LABELS,
        ),
        field(
            &[Key("paths_allowed"), Key("backup_paths"), Each, Key("label")],
            WAN_LABELS,
        ),
        field(
            &[Key("paths_allowed"), Key("l3_failure_paths"), Each, Key("label")],
            WAN_LABELS,
        ),
    ],
    inventory: &[
        InventoryKind::Applications,
        InventoryKind::NetworkContexts,
        InventoryKind::NetworkGlobalPrefixes,
        InventoryKind::NetworkLocalPrefixes,
        InventoryKind::WanLabels,
        InventoryKind::ServiceLabels,
    ],
    default_set: DefaultSetName::StackSuffix,
    normalize_rule: empty_paths_as_null,
};

static QOS: DomainDescriptor = DomainDescriptor {
    domain: Domain::Qos,
    label: "QoS",
    sets: "prioritypolicysets",
    stacks: "prioritypolicysetstacks",
    rules: "prioritypolicyrules",
    order_fields: &[],
    references: &[
        field(&[Key("network_context_id")], CONTEXTS),
        field(&[Key("source_prefixes_id")], QOS_PREFIXES),
        field(&[Key("destination_prefixes_id")], QOS_PREFIXES),
        field(&[Key("app_def_ids"), Each], APPS),
    ],
    inventory: &[
        InventoryKind::Applications,
        InventoryKind::NetworkContexts,
        InventoryKind::PriorityGlobalPrefixes,
        InventoryKind::PriorityLocalPrefixes,
    ],
    default_set: DefaultSetName::StackSuffix,
    normalize_rule: keep_rule,
};

static NAT: DomainDescriptor = DomainDescriptor {
    domain: Domain::Nat,
    label: "NAT",
    sets: "natpolicysets",
    stacks: "natpolicysetstacks",
    rules: "natpolicyrules",
    order_fields: &[
        "destination_zone_policyrule_order",
        "source_zone_policyrule_order",
    ],
    references: &[
        field(&[Key("source_prefixes_id")], NAT_PREFIXES),
        field(&[Key("destination_prefixes_id")], NAT_PREFIXES),
        field(
            &[Key("source_zone_id")],
            Lookup::Inventory(&[InventoryKind::NatZones]),
        ),
        field(
            &[Key("destination_zone_id")],
            Lookup::Inventory(&[InventoryKind::NatZones]),
        ),
        field(
            &[Key("actions"), Each, Key("nat_pool_id")],
            Lookup::Inventory(&[InventoryKind::NatPools]),
        ),
        field(&[Key("actions"), Each, Key("type")], NAT_ACTIONS),
    ],
    inventory: &[
        InventoryKind::NatGlobalPrefixes,
        InventoryKind::NatLocalPrefixes,
        InventoryKind::NatZones,
        InventoryKind::NatPools,
    ],
    default_set: DefaultSetName::None,
    normalize_rule: keep_rule,
};

static SECURITY: DomainDescriptor = DomainDescriptor {
    domain: Domain::Security,
    label: "Security",
    sets: "ngfwsecuritypolicysets",
    stacks: "ngfwsecuritypolicysetstacks",
    rules: "ngfwsecuritypolicyrules",
    order_fields: &["policyrule_order"],
    references: &[
        field(&[Key("source_prefix_ids"), Each], NGFW_PREFIXES),
        field(&[Key("destination_prefix_ids"), Each], NGFW_PREFIXES),
        field(
            &[Key("source_zone_ids"), Each],
            Lookup::Inventory(&[InventoryKind::SecurityZones]),
        ),
        field(
            &[Key("destination_zone_ids"), Each],
            Lookup::Inventory(&[InventoryKind::SecurityZones]),
        ),
        field(&[Key("app_def_ids"), Each], APPS),
    ],
    inventory: &[
        InventoryKind::Applications,
        InventoryKind::NgfwGlobalPrefixes,
        InventoryKind::NgfwLocalPrefixes,
        InventoryKind::SecurityZones,
    ],
    default_set: DefaultSetName::StackSuffix,
    normalize_rule: keep_rule,
};

static PERFORMANCE: DomainDescriptor = DomainDescriptor {
    domain: Domain::Performance,
    label: "Performance",
    sets: "perfmgmtpolicysets",
    stacks: "perfmgmtpolicysetstacks",
    rules: "perfmgmtpolicyrules",
    order_fields: &["link_health_policyrule_order"],
    references: &[
        field(
            &[Key("thresholdprofile_id")],
            Lookup::Inventory(&[InventoryKind::ThresholdProfiles]),
        ),
        field(&[Key("app_filters"), Key("application_ids"), Each], APPS),
        field(&[Key("app_def_ids"), Each], APPS),
    ],
    inventory: &[
        InventoryKind::Applications,
        InventoryKind::ThresholdProfiles,
    ],
    default_set: DefaultSetName::Fixed("Default Performance Policy Set (Simple)"),
    normalize_rule: keep_rule,
};

fn keep_rule(_rule: &mut Attributes) {}

/// The controller reports unset path lists as null, never as `[]`
fn empty_paths_as_null(rule: &mut Attributes) {
    if let Some(Value::Object(paths)) = rule.get_mut("paths_allowed") {
        for value in paths.values_mut() {
            if matches!(value, Value::Array(items) if items.is_empty()) {
                *value = Value::Null;
            }
        }
    }
}
