//! Named attribute validators. Each returns `None` when the value is acceptable, or a reason.

use ipnetwork::IpNetwork;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::OnceLock;

const KNOWN: &[&str] = &[
    "type:string",
    "type:string_or_none",
    "type:not_empty_string",
    "type:uuid",
    "type:uuid_or_none",
    "type:mac_address",
    "type:mac_address_or_none",
    "type:ip_address",
    "type:ip_address_or_none",
    "type:subnet",
    "type:subnet_or_none",
    "type:subnet_list",
    "type:values",
    "type:non_negative",
    "type:range",
    "type:boolean",
    "type:regex",
    "type:regex_or_none",
    "type:fixed_ips",
    "type:nameservers",
    "type:hostroutes",
    "type:ip_pools",
    "type:subnetpool_id",
    "type:subnetpool_id_or_none",
    "type:dict",
    "type:dict_or_none",
];

/// Subnet pool id accepted in place of a UUID to request prefix delegation.
pub const PREFIX_DELEGATION_ID: &str = "prefix_delegation";

pub fn is_known_validator(rule: &str) -> bool {
    KNOWN.contains(&rule)
}

/// Run validator `rule` with its registry argument against `data`.
pub fn run_validator(rule: &str, data: &Value, arg: &Value) -> Option<String> {
    match rule {
        "type:string" => validate_string(data, arg),
        "type:string_or_none" => or_none(data, |d| validate_string(d, arg)),
        "type:not_empty_string" => validate_not_empty_string(data, arg),
        "type:uuid" => validate_uuid(data),
        "type:uuid_or_none" => or_none(data, validate_uuid),
        "type:mac_address" => validate_mac_address(data),
        "type:mac_address_or_none" => or_none(data, validate_mac_address),
        "type:ip_address" => validate_ip_address(data),
        "type:ip_address_or_none" => or_none(data, validate_ip_address),
        "type:subnet" => validate_subnet(data),
        "type:subnet_or_none" => or_none(data, validate_subnet),
        "type:subnet_list" => validate_subnet_list(data),
        "type:values" => validate_values(data, arg),
        "type:non_negative" => validate_non_negative(data),
        "type:range" => validate_range(data, arg),
        "type:boolean" => validate_boolean(data),
        "type:regex" => validate_regex(data, arg),
        "type:regex_or_none" => or_none(data, |d| validate_regex(d, arg)),
        "type:fixed_ips" => validate_fixed_ips(data),
        "type:nameservers" => validate_nameservers(data),
        "type:hostroutes" => validate_hostroutes(data),
        "type:ip_pools" => validate_ip_pools(data),
        "type:subnetpool_id" => validate_subnetpool_id(data),
        "type:subnetpool_id_or_none" => or_none(data, validate_subnetpool_id),
        "type:dict" => validate_dict(data, arg),
        "type:dict_or_none" => or_none(data, |d| validate_dict(d, arg)),
        other => Some(format!("unknown validator {}", other)),
    }
}

/// Strings print bare, everything else as JSON.
pub(crate) fn shown(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn or_none(data: &Value, f: impl Fn(&Value) -> Option<String>) -> Option<String> {
    if data.is_null() {
        None
    } else {
        f(data)
    }
}

fn validate_string(data: &Value, max_len: &Value) -> Option<String> {
    let Some(s) = data.as_str() else {
        return Some(format!("'{}' is not a valid string", shown(data)));
    };
    if let Some(max) = max_len.as_u64() {
        if s.chars().count() as u64 > max {
            return Some(format!("'{}' exceeds maximum length of {}", s, max));
        }
    }
    None
}

fn validate_not_empty_string(data: &Value, max_len: &Value) -> Option<String> {
    if let Some(msg) = validate_string(data, max_len) {
        return Some(msg);
    }
    match data.as_str() {
        Some(s) if s.trim().is_empty() => Some(format!("'{}' Blank strings are not permitted", s)),
        _ => None,
    }
}

fn validate_uuid(data: &Value) -> Option<String> {
    match data.as_str().map(uuid::Uuid::parse_str) {
        Some(Ok(_)) => None,
        _ => Some(format!("'{}' is not a valid UUID", shown(data))),
    }
}

fn mac_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9a-fA-F]{2}[:-]){5}[0-9a-fA-F]{2}$").unwrap_or_else(|_| unreachable!())
    })
}

fn validate_mac_address(data: &Value) -> Option<String> {
    let ok = data
        .as_str()
        .map(|s| mac_pattern().is_match(s) && s.replace(['-', ':'], "") != "000000000000")
        .unwrap_or(false);
    if ok {
        None
    } else {
        Some(format!("'{}' is not a valid MAC address", shown(data)))
    }
}

fn parse_ip(data: &Value) -> Option<IpAddr> {
    data.as_str().and_then(|s| s.parse().ok())
}

fn validate_ip_address(data: &Value) -> Option<String> {
    match parse_ip(data) {
        Some(_) => None,
        None => Some(format!("'{}' is not a valid IP address", shown(data))),
    }
}

/// `192.0.2.0/24` style CIDR. The prefix length is mandatory; host bits are kept.
pub fn parse_cidr(s: &str) -> Option<IpNetwork> {
    if !s.contains('/') {
        return None;
    }
    s.trim().parse().ok()
}

/// IPv4 subnets must be given by their network address.
fn validate_subnet(data: &Value) -> Option<String> {
    let Some(s) = data.as_str() else {
        return Some(format!("'{}' is not a valid IP subnet", shown(data)));
    };
    match parse_cidr(s) {
        Some(net) if net.is_ipv4() && net.ip() != net.network() => Some(format!(
            "'{}' isn't a recognized IP subnet cidr, '{}/{}' is recommended",
            s,
            net.network(),
            net.prefix()
        )),
        Some(_) => None,
        None => Some(format!("'{}' is not a valid IP subnet", s)),
    }
}

fn validate_subnet_list(data: &Value) -> Option<String> {
    let Some(items) = data.as_array() else {
        return Some(format!("'{}' is not a list", shown(data)));
    };
    let mut seen = HashSet::new();
    for item in items {
        if let Some(msg) = validate_subnet(item) {
            return Some(msg);
        }
        if !seen.insert(shown(item)) {
            return Some(format!("Duplicate items in the list: '{}'", shown(item)));
        }
    }
    None
}

fn validate_values(data: &Value, allowed: &Value) -> Option<String> {
    let allowed = allowed.as_array().map(Vec::as_slice).unwrap_or(&[]);
    if allowed.iter().any(|a| a == data) {
        None
    } else {
        let list: Vec<String> = allowed.iter().map(shown).collect();
        Some(format!("'{}' is not in [{}]", shown(data), list.join(", ")))
    }
}

fn as_integer(data: &Value) -> Option<i64> {
    match data {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn validate_non_negative(data: &Value) -> Option<String> {
    match as_integer(data) {
        Some(n) if n >= 0 => None,
        Some(_) => Some(format!("'{}' should be non-negative", shown(data))),
        None => Some(format!("'{}' is not an integer", shown(data))),
    }
}

fn validate_range(data: &Value, bounds: &Value) -> Option<String> {
    let Some(n) = as_integer(data) else {
        return Some(format!("'{}' is not an integer", shown(data)));
    };
    let lo = bounds.get(0).and_then(Value::as_i64);
    let hi = bounds.get(1).and_then(Value::as_i64);
    let too_low = lo.map(|lo| n < lo).unwrap_or(false);
    let too_high = hi.map(|hi| n > hi).unwrap_or(false);
    if too_low || too_high {
        let fmt = |b: Option<i64>| b.map(|b| b.to_string()).unwrap_or_else(|| "unlimited".into());
        return Some(format!("'{}' is not in range {} through {}", n, fmt(lo), fmt(hi)));
    }
    None
}

fn validate_boolean(data: &Value) -> Option<String> {
    match data {
        Value::Bool(_) => None,
        Value::String(s) if matches!(s.to_lowercase().as_str(), "true" | "false") => None,
        _ => Some(format!("'{}' is not a valid boolean value", shown(data))),
    }
}

fn validate_regex(data: &Value, pattern: &Value) -> Option<String> {
    let Some(s) = data.as_str() else {
        return Some(format!("'{}' is not a valid input", shown(data)));
    };
    let Some(pattern) = pattern.as_str() else {
        return Some("missing pattern".into());
    };
    match Regex::new(pattern) {
        Ok(re) if re.is_match(s) => None,
        Ok(_) => Some(format!("'{}' is not a valid input", s)),
        Err(_) => Some(format!("invalid pattern {}", pattern)),
    }
}

fn validate_fixed_ips(data: &Value) -> Option<String> {
    let Some(items) = data.as_array() else {
        return Some(format!("Invalid data format for fixed IP: '{}'", shown(data)));
    };
    let mut ips = HashSet::new();
    for item in items {
        let Some(obj) = item.as_object() else {
            return Some(format!("Invalid data format for fixed IP: '{}'", shown(item)));
        };
        for (key, value) in obj {
            match key.as_str() {
                "ip_address" => {
                    if let Some(msg) = validate_ip_address(value) {
                        return Some(msg);
                    }
                    if !ips.insert(shown(value)) {
                        return Some(format!("Duplicate IP address '{}'", shown(value)));
                    }
                }
                "subnet_id" => {
                    if let Some(msg) = validate_uuid(value) {
                        return Some(msg);
                    }
                }
                other => return Some(format!("Unrecognized key '{}' in fixed IP", other)),
            }
        }
    }
    None
}

fn validate_nameservers(data: &Value) -> Option<String> {
    let Some(items) = data.as_array() else {
        return Some(format!("Invalid data format for nameserver: '{}'", shown(data)));
    };
    let mut seen = HashSet::new();
    for ns in items {
        if parse_ip(ns).is_none() {
            return Some(format!("'{}' is not a valid nameserver", shown(ns)));
        }
        if !seen.insert(shown(ns)) {
            return Some(format!("Duplicate nameserver '{}'", shown(ns)));
        }
    }
    None
}

fn exact_keys(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> bool {
    obj.len() == keys.len() && keys.iter().all(|k| obj.contains_key(*k))
}

fn validate_hostroutes(data: &Value) -> Option<String> {
    let Some(items) = data.as_array() else {
        return Some(format!("Invalid data format for hostroute: '{}'", shown(data)));
    };
    let mut seen = HashSet::new();
    for route in items {
        let valid = route
            .as_object()
            .map(|o| exact_keys(o, &["destination", "nexthop"]))
            .unwrap_or(false);
        if !valid {
            return Some(format!("Invalid data format for hostroute: '{}'", shown(route)));
        }
        if let Some(msg) = validate_subnet(&route["destination"]) {
            return Some(msg);
        }
        if let Some(msg) = validate_ip_address(&route["nexthop"]) {
            return Some(msg);
        }
        if !seen.insert(route.to_string()) {
            return Some(format!("Duplicate hostroute '{}'", route));
        }
    }
    None
}

fn validate_ip_pools(data: &Value) -> Option<String> {
    let Some(items) = data.as_array() else {
        return Some(format!("Invalid data format for IP pool: '{}'", shown(data)));
    };
    for pool in items {
        let valid = pool
            .as_object()
            .map(|o| exact_keys(o, &["start", "end"]))
            .unwrap_or(false);
        if !valid {
            return Some(format!("Invalid data format for IP pool: '{}'", shown(pool)));
        }
        for key in ["start", "end"] {
            if let Some(msg) = validate_ip_address(&pool[key]) {
                return Some(msg);
            }
        }
    }
    None
}

fn validate_subnetpool_id(data: &Value) -> Option<String> {
    if data.as_str() == Some(PREFIX_DELEGATION_ID) {
        None
    } else {
        validate_uuid(data)
    }
}

/// `arg` may list keys the dict must contain.
fn validate_dict(data: &Value, required: &Value) -> Option<String> {
    let Some(obj) = data.as_object() else {
        return Some(format!("'{}' is not a dictionary", shown(data)));
    };
    if let Some(keys) = required.as_array() {
        let missing: Vec<String> = keys
            .iter()
            .filter_map(Value::as_str)
            .filter(|k| !obj.contains_key(*k))
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Some(format!("Validation of dictionary's keys failed. Expected keys: {}", missing.join(", ")));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(rule: &str, data: Value, arg: Value) {
        assert_eq!(run_validator(rule, &data, &arg), None, "{} {}", rule, data);
    }

    fn bad(rule: &str, data: Value, arg: Value) -> String {
        run_validator(rule, &data, &arg).unwrap_or_else(|| panic!("{} accepted {}", rule, data))
    }

    #[test]
    fn string_length_limit() {
        ok("type:string", json!("net1"), json!(255));
        ok("type:string", json!(""), Value::Null);
        let long = "x".repeat(256);
        assert!(bad("type:string", json!(long), json!(255)).contains("exceeds maximum length of 255"));
        assert!(bad("type:string", json!(5), json!(255)).contains("not a valid string"));
        ok("type:string_or_none", Value::Null, json!(10));
    }

    #[test]
    fn blank_strings_rejected() {
        assert!(bad("type:not_empty_string", json!("  "), Value::Null).contains("Blank strings"));
        ok("type:not_empty_string", json!("pool"), Value::Null);
    }

    #[test]
    fn uuid_and_mac() {
        ok("type:uuid", json!("6f0d7f5e-3b0e-4a5c-9f7f-1d2c3b4a5e6f"), Value::Null);
        bad("type:uuid", json!("not-a-uuid"), Value::Null);
        ok("type:uuid_or_none", Value::Null, Value::Null);
        ok("type:mac_address", json!("fa:16:3e:00:11:22"), Value::Null);
        bad("type:mac_address", json!("00:00:00:00:00:00"), Value::Null);
        bad("type:mac_address", json!("fa:16:3e:00:11"), Value::Null);
    }

    #[test]
    fn subnet_requires_network_address() {
        ok("type:subnet", json!("10.0.0.0/24"), Value::Null);
        let msg = bad("type:subnet", json!("10.0.0.5/24"), Value::Null);
        assert!(msg.contains("'10.0.0.0/24' is recommended"), "{}", msg);
        ok("type:subnet_or_none", Value::Null, Value::Null);
        bad("type:subnet", json!("10.0.0.0"), Value::Null);
        bad("type:subnet", json!("10.0.0.0/33"), Value::Null);
        bad("type:subnet_list", json!(["10.0.0.0/8", "10.0.0.0/8"]), Value::Null);
    }

    #[test]
    fn ipv6_subnet_may_carry_host_bits() {
        ok("type:subnet", json!("2001:db8::/64"), Value::Null);
        ok("type:subnet", json!("2001:db8::1/64"), Value::Null);
        bad("type:subnet", json!("2001:db8::/129"), Value::Null);
    }

    #[test]
    fn values_and_ranges() {
        ok("type:values", json!(4), json!([4, 6]));
        assert!(bad("type:values", json!(5), json!([4, 6])).contains("is not in [4, 6]"));
        ok("type:non_negative", json!(0), Value::Null);
        bad("type:non_negative", json!(-1), Value::Null);
        ok("type:range", json!(100), json!([1, 4094]));
        bad("type:range", json!(4095), json!([1, 4094]));
    }

    #[test]
    fn structured_lists() {
        ok(
            "type:fixed_ips",
            json!([{ "ip_address": "10.0.0.3" }, { "subnet_id": "6f0d7f5e-3b0e-4a5c-9f7f-1d2c3b4a5e6f" }]),
            Value::Null,
        );
        bad("type:fixed_ips", json!([{ "ip_address": "10.0.0.3" }, { "ip_address": "10.0.0.3" }]), Value::Null);
        bad("type:fixed_ips", json!([{ "mac": "x" }]), Value::Null);
        ok("type:nameservers", json!(["8.8.8.8", "2001:4860:4860::8888"]), Value::Null);
        bad("type:nameservers", json!(["8.8.8.8", "8.8.8.8"]), Value::Null);
        ok("type:hostroutes", json!([{ "destination": "0.0.0.0/0", "nexthop": "10.0.0.1" }]), Value::Null);
        bad("type:hostroutes", json!([{ "destination": "0.0.0.0/0" }]), Value::Null);
        ok("type:ip_pools", json!([{ "start": "10.0.0.2", "end": "10.0.0.9" }]), Value::Null);
        bad("type:ip_pools", json!([{ "start": "10.0.0.2" }]), Value::Null);
    }

    #[test]
    fn subnetpool_id_accepts_prefix_delegation() {
        ok("type:subnetpool_id_or_none", json!(PREFIX_DELEGATION_ID), Value::Null);
        ok("type:subnetpool_id_or_none", Value::Null, Value::Null);
        bad("type:subnetpool_id", json!("pool"), Value::Null);
    }

    #[test]
    fn every_known_validator_dispatches() {
        for rule in KNOWN {
            let out = run_validator(rule, &Value::Null, &Value::Null);
            assert!(!out.unwrap_or_default().starts_with("unknown validator"), "{}", rule);
        }
        assert!(!is_known_validator("type:bogus"));
    }
}
