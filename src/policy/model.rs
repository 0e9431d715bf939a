// Object shapes shared by the loader, the catalog and the reconcilers
use serde_json::{Map, Value};

/// Open attribute mapping of a Set, Stack or Rule
pub type Attributes = Map<String, Value>;

pub const ID: &str = "id";
pub const NAME: &str = "name";
pub const CLONE_FROM: &str = "clone_from";
/// Set flag marking the domain's fallback Set
pub const DEFAULT_SET_FLAG: &str = "defaultrule_policyset";
/// Stack flag marking the tenant's built-in Stack
pub const DEFAULT_STACK_FLAG: &str = "default_policysetstack";
pub const STACK_DEFAULT_SET: &str = "defaultrule_policyset_id";
pub const STACK_SETS: &str = "policyset_ids";

/// Controller decoration that must never be sent back or compared
pub const DECORATION_KEYS: &[&str] = &[
    "_created_on_utc",
    "_debug",
    "_error",
    "_etag",
    "_info",
    "_schema",
    "_updated_on_utc",
    "_warning",
    "_request_id",
    "_content_length",
    "_status_code",
];

/// A Stack or Rule as written in the desired document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DesiredObject {
    pub name: String,
    pub attributes: Attributes,
}

/// A Set as written in the desired document, its Rules split out
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DesiredSet {
    pub name: String,
    pub attributes: Attributes,
    pub rules: Vec<DesiredObject>,
}

pub fn object_id(object: &Attributes) -> Option<&str> {
    object.get(ID).and_then(Value::as_str)
}

pub fn object_name(object: &Attributes) -> Option<&str> {
    object.get(NAME).and_then(Value::as_str)
}

/// True only for an explicit boolean `true`
pub fn is_flagged(object: &Attributes, flag: &str) -> bool {
    matches!(object.get(flag), Some(Value::Bool(true)))
}

/// Remove controller decoration and the `id` from an object
pub fn strip_decoration(object: &mut Attributes) {
    for key in DECORATION_KEYS {
        object.remove(*key);
    }
    object.remove(ID);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flag_requires_boolean_true() {
        let object = json!({"a": true, "b": "true", "c": false})
            .as_object()
            .cloned()
            .unwrap();
        assert!(is_flagged(&object, "a"));
        assert!(!is_flagged(&object, "b"));
        assert!(!is_flagged(&object, "c"));
        assert!(!is_flagged(&object, "missing"));
    }

    #[test]
    fn strip_keeps_domain_fields() {
        let mut object = json!({"id": "1", "_etag": 3, "_schema": 1, "name": "Corp", "enabled": true})
            .as_object()
            .cloned()
            .unwrap();
        strip_decoration(&mut object);
        assert_eq!(
            object,
            json!({"name": "Corp", "enabled": true}).as_object().cloned().unwrap()
        );
    }
}
