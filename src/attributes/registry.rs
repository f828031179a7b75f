//! Resource attribute registry: collection name to attribute rules, plurals and foreign keys.

use crate::attributes::types::{AttributeMap, AttributeSpec, Converter};
use crate::error::ConfigError;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

pub const NAME_MAX_LEN: u64 = 255;
pub const TENANT_ID_MAX_LEN: u64 = 255;
pub const DESCRIPTION_MAX_LEN: u64 = 255;
pub const LONG_DESCRIPTION_MAX_LEN: u64 = 1024;
pub const DEVICE_ID_MAX_LEN: u64 = 255;
pub const DEVICE_OWNER_MAX_LEN: u64 = 255;

pub const SHARED: &str = "shared";
pub const TENANT_ID: &str = "tenant_id";

pub const NETWORK: &str = "network";
pub const NETWORKS: &str = "networks";
pub const PORT: &str = "port";
pub const PORTS: &str = "ports";
pub const SUBNET: &str = "subnet";
pub const SUBNETS: &str = "subnets";
pub const SUBNETPOOL: &str = "subnetpool";
pub const SUBNETPOOLS: &str = "subnetpools";
pub const PORTPROFILE: &str = "portprofile";
pub const PORTPROFILES: &str = "portprofiles";

pub const IPV6_MODES: [&str; 3] = ["dhcpv6-stateful", "dhcpv6-stateless", "slaac"];

/// Static description of every resource the API exposes.
#[derive(Debug)]
pub struct ResourceRegistry {
    collections: BTreeMap<String, AttributeMap>,
    /// Collection to the attribute other resources use to reference it.
    foreign_keys: BTreeMap<String, String>,
    plurals: BTreeMap<String, String>,
    /// Singular to plural, filled lazily by `get_resource_info`.
    reversed_plurals: RwLock<HashMap<String, String>>,
}

impl Clone for ResourceRegistry {
    fn clone(&self) -> Self {
        let reversed = self
            .reversed_plurals
            .read()
            .map(|g| g.clone())
            .unwrap_or_default();
        ResourceRegistry {
            collections: self.collections.clone(),
            foreign_keys: self.foreign_keys.clone(),
            plurals: self.plurals.clone(),
            reversed_plurals: RwLock::new(reversed),
        }
    }
}

impl ResourceRegistry {
    pub fn empty() -> Self {
        ResourceRegistry {
            collections: BTreeMap::new(),
            foreign_keys: BTreeMap::new(),
            plurals: BTreeMap::new(),
            reversed_plurals: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the core network resources and the port-profile extension.
    pub fn core() -> Self {
        let mut r = Self::empty();
        r.collections.insert(NETWORKS.into(), network_attributes());
        r.collections.insert(PORTS.into(), port_attributes());
        r.collections.insert(SUBNETS.into(), subnet_attributes());
        r.collections.insert(SUBNETPOOLS.into(), subnetpool_attributes());
        r.collections.insert(PORTPROFILES.into(), portprofile_attributes());
        r.foreign_keys.insert(NETWORKS.into(), "network_id".into());
        for (plural, singular) in [
            (NETWORKS, NETWORK),
            (PORTS, PORT),
            (SUBNETS, SUBNET),
            (SUBNETPOOLS, SUBNETPOOL),
            (PORTPROFILES, PORTPROFILE),
            ("dns_nameservers", "dns_nameserver"),
            ("host_routes", "host_route"),
            ("allocation_pools", "allocation_pool"),
            ("fixed_ips", "fixed_ip"),
            ("extensions", "extension"),
        ] {
            r.plurals.insert(plural.into(), singular.into());
        }
        r
    }

    pub fn get_collection_info(&self, collection: &str) -> Option<&AttributeMap> {
        self.collections.get(collection)
    }

    /// Attribute info by singular resource name.
    pub fn get_resource_info(&self, resource: &str) -> Option<&AttributeMap> {
        let plural = self.plural_of(resource)?;
        self.collections.get(&plural)
    }

    pub fn plural_of(&self, resource: &str) -> Option<String> {
        if let Ok(cache) = self.reversed_plurals.read() {
            if let Some(p) = cache.get(resource) {
                return Some(p.clone());
            }
        }
        let plural = self
            .plurals
            .iter()
            .find(|(_, singular)| singular.as_str() == resource)
            .map(|(plural, _)| plural.clone())?;
        if let Ok(mut cache) = self.reversed_plurals.write() {
            cache.insert(resource.to_string(), plural.clone());
        }
        Some(plural)
    }

    pub fn singular_of(&self, collection: &str) -> Option<&str> {
        self.plurals.get(collection).map(String::as_str)
    }

    /// (referenced collection, attribute) pairs for attributes of `collection` that point at another resource.
    pub fn references_from(&self, collection: &str) -> Vec<(&str, &str)> {
        let Some(attrs) = self.collections.get(collection) else {
            return Vec::new();
        };
        self.foreign_keys
            .iter()
            .filter(|(target, key)| target.as_str() != collection && attrs.contains_key(key.as_str()))
            .map(|(target, key)| (target.as_str(), key.as_str()))
            .collect()
    }

    /// Collections holding an attribute that references `collection`.
    pub fn referencing(&self, collection: &str) -> Vec<(&str, &str)> {
        let Some(key) = self.foreign_keys.get(collection) else {
            return Vec::new();
        };
        self.collections
            .iter()
            .filter(|(name, attrs)| name.as_str() != collection && attrs.contains_key(key.as_str()))
            .map(|(name, _)| (name.as_str(), key.as_str()))
            .collect()
    }

    pub fn collections(&self) -> impl Iterator<Item = (&str, &AttributeMap)> {
        self.collections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge extension attributes into an existing collection, or add a new collection.
    pub fn extend(&mut self, collection: &str, attrs: AttributeMap) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(attrs);
    }

    pub fn add_plural(&mut self, plural: &str, singular: &str) {
        self.plurals.insert(plural.to_string(), singular.to_string());
        if let Ok(mut cache) = self.reversed_plurals.write() {
            cache.remove(singular);
        }
    }

    pub fn add_foreign_key(&mut self, collection: &str, attribute: &str) {
        self.foreign_keys
            .insert(collection.to_string(), attribute.to_string());
    }

    pub fn collection_or_err(&self, collection: &str) -> Result<&AttributeMap, ConfigError> {
        self.get_collection_info(collection)
            .ok_or_else(|| ConfigError::UnknownCollection(collection.to_string()))
    }
}

fn id_attribute() -> AttributeSpec {
    AttributeSpec::new(false, false)
        .validate("type:uuid", Value::Null)
        .visible()
        .primary_key()
}

fn name_attribute() -> AttributeSpec {
    AttributeSpec::new(true, true)
        .validate("type:string", json!(NAME_MAX_LEN))
        .default_value(json!(""))
        .visible()
}

fn tenant_attribute() -> AttributeSpec {
    AttributeSpec::new(true, false)
        .validate("type:string", json!(TENANT_ID_MAX_LEN))
        .required_by_policy()
        .visible()
}

fn admin_state_attribute() -> AttributeSpec {
    AttributeSpec::new(true, true)
        .default_value(json!(true))
        .convert_to(Converter::ToBoolean)
        .visible()
}

fn status_attribute() -> AttributeSpec {
    AttributeSpec::new(false, false).visible()
}

fn attrs(entries: Vec<(&str, AttributeSpec)>) -> AttributeMap {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn network_attributes() -> AttributeMap {
    attrs(vec![
        ("id", id_attribute()),
        ("name", name_attribute()),
        (
            "subnets",
            AttributeSpec::new(false, false).default_value(json!([])).visible(),
        ),
        ("admin_state_up", admin_state_attribute()),
        ("status", status_attribute()),
        (TENANT_ID, tenant_attribute()),
        (
            SHARED,
            AttributeSpec::new(true, true)
                .default_value(json!(false))
                .convert_to(Converter::ToBoolean)
                .visible()
                .required_by_policy()
                .enforce_policy(),
        ),
    ])
}

fn port_attributes() -> AttributeMap {
    attrs(vec![
        ("id", id_attribute()),
        ("name", name_attribute()),
        (
            "network_id",
            AttributeSpec::new(true, false)
                .required_by_policy()
                .validate("type:uuid", Value::Null)
                .visible(),
        ),
        ("admin_state_up", admin_state_attribute()),
        (
            "mac_address",
            AttributeSpec::new(true, true)
                .generated()
                .validate("type:mac_address", Value::Null)
                .enforce_policy()
                .visible(),
        ),
        (
            "fixed_ips",
            AttributeSpec::new(true, true)
                .generated()
                .convert_list_to(Converter::KvpListToDict)
                .validate("type:fixed_ips", Value::Null)
                .enforce_policy()
                .visible(),
        ),
        (
            "device_id",
            AttributeSpec::new(true, true)
                .validate("type:string", json!(DEVICE_ID_MAX_LEN))
                .default_value(json!(""))
                .visible(),
        ),
        (
            "device_owner",
            AttributeSpec::new(true, true)
                .validate("type:string", json!(DEVICE_OWNER_MAX_LEN))
                .default_value(json!(""))
                .enforce_policy()
                .visible(),
        ),
        (TENANT_ID, tenant_attribute()),
        ("status", status_attribute()),
    ])
}

fn subnet_attributes() -> AttributeMap {
    attrs(vec![
        ("id", id_attribute()),
        ("name", name_attribute()),
        (
            "ip_version",
            AttributeSpec::new(true, false)
                .convert_to(Converter::ToInt)
                .validate("type:values", json!([4, 6]))
                .visible(),
        ),
        (
            "network_id",
            AttributeSpec::new(true, false)
                .required_by_policy()
                .validate("type:uuid", Value::Null)
                .visible(),
        ),
        (
            "subnetpool_id",
            AttributeSpec::new(true, false)
                .generated()
                .validate("type:subnetpool_id_or_none", Value::Null)
                .visible(),
        ),
        (
            "prefixlen",
            AttributeSpec::new(true, false)
                .validate("type:non_negative", Value::Null)
                .convert_to(Converter::ToInt)
                .generated(),
        ),
        (
            "cidr",
            AttributeSpec::new(true, false)
                .generated()
                .validate("type:subnet_or_none", Value::Null)
                .visible(),
        ),
        (
            "gateway_ip",
            AttributeSpec::new(true, true)
                .generated()
                .validate("type:ip_address_or_none", Value::Null)
                .visible(),
        ),
        (
            "allocation_pools",
            AttributeSpec::new(true, true)
                .generated()
                .validate("type:ip_pools", Value::Null)
                .visible(),
        ),
        (
            "dns_nameservers",
            AttributeSpec::new(true, true)
                .convert_to(Converter::NoneToEmptyList)
                .generated()
                .validate("type:nameservers", Value::Null)
                .visible(),
        ),
        (
            "host_routes",
            AttributeSpec::new(true, true)
                .convert_to(Converter::NoneToEmptyList)
                .generated()
                .validate("type:hostroutes", Value::Null)
                .visible(),
        ),
        (TENANT_ID, tenant_attribute()),
        (
            "enable_dhcp",
            AttributeSpec::new(true, true)
                .default_value(json!(true))
                .convert_to(Converter::ToBoolean)
                .visible(),
        ),
        (
            "ipv6_ra_mode",
            AttributeSpec::new(true, false)
                .generated()
                .validate("type:values", json!(IPV6_MODES))
                .visible(),
        ),
        (
            "ipv6_address_mode",
            AttributeSpec::new(true, false)
                .generated()
                .validate("type:values", json!(IPV6_MODES))
                .visible(),
        ),
        (
            SHARED,
            AttributeSpec::new(false, false)
                .default_value(json!(false))
                .convert_to(Converter::ToBoolean)
                .required_by_policy()
                .enforce_policy(),
        ),
    ])
}

fn subnetpool_attributes() -> AttributeMap {
    let prefixlen = || {
        AttributeSpec::new(true, true)
            .validate("type:non_negative", Value::Null)
            .convert_to(Converter::ToInt)
            .generated()
            .visible()
    };
    attrs(vec![
        ("id", id_attribute()),
        (
            "name",
            AttributeSpec::new(true, true)
                .validate("type:not_empty_string", Value::Null)
                .visible(),
        ),
        (TENANT_ID, tenant_attribute()),
        (
            "prefixes",
            AttributeSpec::new(true, true)
                .validate("type:subnet_list", Value::Null)
                .visible(),
        ),
        ("default_quota", prefixlen()),
        ("ip_version", AttributeSpec::new(false, false).visible()),
        ("default_prefixlen", prefixlen()),
        ("min_prefixlen", prefixlen()),
        ("max_prefixlen", prefixlen()),
        (
            "is_default",
            AttributeSpec::new(true, true)
                .default_value(json!(false))
                .convert_to(Converter::ToBoolean)
                .visible()
                .required_by_policy()
                .enforce_policy(),
        ),
        (
            SHARED,
            AttributeSpec::new(true, false)
                .default_value(json!(false))
                .convert_to(Converter::ToBoolean)
                .visible()
                .required_by_policy()
                .enforce_policy(),
        ),
    ])
}

fn portprofile_attributes() -> AttributeMap {
    attrs(vec![
        ("id", id_attribute()),
        (
            "name",
            AttributeSpec::new(true, true)
                .validate("type:not_empty_string", Value::Null)
                .visible(),
        ),
        (
            "vlan_id",
            AttributeSpec::new(true, false)
                .convert_to(Converter::ToInt)
                .validate("type:range", json!([1, 4094]))
                .visible(),
        ),
        (
            "qos_name",
            AttributeSpec::new(true, false)
                .default_value(Value::Null)
                .validate("type:string_or_none", json!(NAME_MAX_LEN))
                .visible(),
        ),
        (
            "assignment",
            AttributeSpec::new(false, false).default_value(json!([])).visible(),
        ),
        (TENANT_ID, tenant_attribute()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_registry_has_every_collection() {
        let r = ResourceRegistry::core();
        for c in [NETWORKS, PORTS, SUBNETS, SUBNETPOOLS, PORTPROFILES] {
            assert!(r.get_collection_info(c).is_some(), "{}", c);
        }
        assert!(r.get_collection_info("routers").is_none());
    }

    #[test]
    fn resource_info_resolves_singular_through_plurals() {
        let r = ResourceRegistry::core();
        let by_singular = r.get_resource_info(SUBNET).unwrap();
        assert!(std::ptr::eq(by_singular, r.get_collection_info(SUBNETS).unwrap()));
        // second lookup hits the reverse cache
        assert!(r.get_resource_info(SUBNET).is_some());
        assert!(r.get_resource_info("fixed_ip").is_none());
        assert!(r.get_resource_info("router").is_none());
    }

    #[test]
    fn network_foreign_key_is_referenced_by_ports_and_subnets() {
        let r = ResourceRegistry::core();
        let mut referencing: Vec<_> = r.referencing(NETWORKS).into_iter().map(|(c, _)| c).collect();
        referencing.sort();
        assert_eq!(referencing, vec![PORTS, SUBNETS]);
        assert_eq!(r.references_from(PORTS), vec![(NETWORKS, "network_id")]);
        assert!(r.references_from(NETWORKS).is_empty());
    }

    #[test]
    fn primary_keys_are_visible_and_read_only() {
        let r = ResourceRegistry::core();
        for (name, attrs) in r.collections() {
            let pks: Vec<_> = attrs.iter().filter(|(_, s)| s.primary_key).collect();
            assert_eq!(pks.len(), 1, "{}", name);
            let (_, spec) = pks[0];
            assert!(spec.is_visible && !spec.allow_post && !spec.allow_put);
        }
    }

    #[test]
    fn extend_adds_attributes_to_existing_collection() {
        let mut r = ResourceRegistry::core();
        let mut extra = AttributeMap::new();
        extra.insert(
            "description".into(),
            AttributeSpec::new(true, true).default_value(json!("")).visible(),
        );
        r.extend(NETWORKS, extra);
        let nets = r.get_collection_info(NETWORKS).unwrap();
        assert!(nets.contains_key("description"));
        assert!(nets.contains_key("shared"));
    }
}
