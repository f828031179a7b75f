//! Record materialization shared by the plugins: fills generated attributes on create.

use crate::attributes::{AttrValue, Attributes, NETWORKS, PORTS, SUBNETPOOLS, SUBNETS};
use crate::error::AppError;
use crate::plugin::Record;
use crate::service::validation::parse_cidr;
use ipnetwork::IpNetwork;
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Build the stored record for a new resource with primary key `id`.
pub fn build_record(collection: &str, id: &str, attrs: Attributes) -> Result<Record, AppError> {
    let mut record = Record::new();
    let mut unspecified = Vec::new();
    for (k, v) in attrs {
        match v {
            AttrValue::Set(v) => {
                record.insert(k, v);
            }
            AttrValue::NotSpecified => unspecified.push(k),
        }
    }
    record.insert("id".into(), Value::String(id.to_string()));
    match collection {
        NETWORKS => {
            record.insert("status".into(), json!("ACTIVE"));
            record.insert("subnets".into(), json!([]));
        }
        PORTS => {
            record.insert("status".into(), json!("DOWN"));
            if unspecified.iter().any(|k| k == "mac_address") {
                record.insert("mac_address".into(), Value::String(generate_mac(id)));
            }
            if unspecified.iter().any(|k| k == "fixed_ips") {
                record.insert("fixed_ips".into(), json!([]));
            }
        }
        SUBNETS => fill_subnet(&mut record, &unspecified)?,
        SUBNETPOOLS => fill_subnetpool(&mut record, &unspecified)?,
        _ => {}
    }
    for k in unspecified {
        record.entry(k).or_insert(Value::Null);
    }
    Ok(record)
}

/// Overwrite specified attributes of an existing record.
pub fn apply_update(record: &mut Record, attrs: Attributes) {
    for (k, v) in attrs {
        if let AttrValue::Set(v) = v {
            record.insert(k, v);
        }
    }
}

/// Locally administered MAC in the fa:16:3e range derived from the resource id.
fn generate_mac(id: &str) -> String {
    let bytes = uuid::Uuid::parse_str(id)
        .map(|u| *u.as_bytes())
        .unwrap_or_else(|_| *uuid::Uuid::new_v4().as_bytes());
    format!("fa:16:3e:{:02x}:{:02x}:{:02x}", bytes[13], bytes[14], bytes[15])
}

fn fill_subnet(record: &mut Record, unspecified: &[String]) -> Result<(), AppError> {
    let is_unspecified = |k: &str| unspecified.iter().any(|u| u == k);
    let cidr = record.get("cidr").and_then(Value::as_str).map(String::from);
    let Some(cidr) = cidr else {
        return Err(AppError::BadRequest(
            "a cidr must be specified in the absence of a subnet pool".into(),
        ));
    };
    let net = parse_cidr(&cidr).ok_or_else(|| AppError::BadRequest(format!("invalid cidr {}", cidr)))?;
    let requested_version = record.get("ip_version").and_then(Value::as_u64);
    if requested_version != Some(ip_version(&net)) {
        return Err(AppError::BadRequest(format!(
            "Cidr {} does not match the requested ip_version",
            cidr
        )));
    }
    record.insert("prefixlen".into(), json!(net.prefix()));

    if is_unspecified("gateway_ip") {
        let gateway = if host_bits(&net) > 1 { Some(step(net.network(), 1)) } else { None };
        record.insert("gateway_ip".into(), json!(gateway.map(|g| g.to_string())));
    } else if let Some(gw) = record.get("gateway_ip").and_then(Value::as_str) {
        let gw: IpAddr = gw
            .parse()
            .map_err(|_| AppError::BadRequest(format!("invalid gateway_ip {}", gw)))?;
        if !net.contains(gw) {
            return Err(AppError::BadRequest(format!("Gateway ip {} conflicts with subnet {}", gw, cidr)));
        }
    }

    if is_unspecified("allocation_pools") {
        let gateway = record
            .get("gateway_ip")
            .and_then(Value::as_str)
            .and_then(|g| g.parse::<IpAddr>().ok());
        let pools: Vec<Value> = allocation_pools(&net, gateway)
            .into_iter()
            .map(|(start, end)| json!({ "start": start.to_string(), "end": end.to_string() }))
            .collect();
        record.insert("allocation_pools".into(), Value::Array(pools));
    } else if let Some(pools) = record.get("allocation_pools").and_then(Value::as_array) {
        for pool in pools {
            for key in ["start", "end"] {
                let ip = pool.get(key).and_then(Value::as_str).and_then(|s| s.parse::<IpAddr>().ok());
                if !ip.map(|ip| net.contains(ip)).unwrap_or(false) {
                    return Err(AppError::BadRequest(format!(
                        "The allocation pool {} spans beyond the subnet cidr {}",
                        pool, cidr
                    )));
                }
            }
        }
    }

    for list in ["dns_nameservers", "host_routes"] {
        if is_unspecified(list) {
            record.insert(list.into(), json!([]));
        }
    }
    Ok(())
}

/// Usable host range of `net` with the gateway cut out. IPv4 reserves the
/// network and broadcast addresses; IPv6 only the subnet-router anycast address.
fn allocation_pools(net: &IpNetwork, gateway: Option<IpAddr>) -> Vec<(IpAddr, IpAddr)> {
    let first = net.network();
    if host_bits(net) == 0 {
        return vec![(first, first)];
    }
    let start = step(first, 1);
    let end = if net.is_ipv4() { step(net.broadcast(), -1) } else { net.broadcast() };
    if to_bits(start) > to_bits(end) {
        return Vec::new();
    }
    let Some(gw) = gateway.filter(|g| (to_bits(start)..=to_bits(end)).contains(&to_bits(*g))) else {
        return vec![(start, end)];
    };
    let mut pools = Vec::new();
    if gw != start {
        pools.push((start, step(gw, -1)));
    }
    if gw != end {
        pools.push((step(gw, 1), end));
    }
    pools
}

fn ip_version(net: &IpNetwork) -> u64 {
    if net.is_ipv4() {
        4
    } else {
        6
    }
}

fn host_bits(net: &IpNetwork) -> u8 {
    let width = if net.is_ipv4() { 32 } else { 128 };
    width - net.prefix()
}

fn to_bits(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(a) => u32::from(a) as u128,
        IpAddr::V6(a) => u128::from(a),
    }
}

/// `ip` moved by `delta` within its family. Callers stay inside a network.
fn step(ip: IpAddr, delta: i8) -> IpAddr {
    let n = if delta < 0 {
        to_bits(ip).wrapping_sub(delta.unsigned_abs() as u128)
    } else {
        to_bits(ip).wrapping_add(delta as u128)
    };
    match ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from(n as u32)),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(n)),
    }
}

fn fill_subnetpool(record: &mut Record, unspecified: &[String]) -> Result<(), AppError> {
    let prefixes: Vec<IpNetwork> = record
        .get("prefixes")
        .and_then(Value::as_array)
        .map(|p| p.iter().filter_map(Value::as_str).filter_map(parse_cidr).collect())
        .unwrap_or_default();
    let Some(first) = prefixes.first() else {
        return Err(AppError::BadRequest("A subnet pool requires at least one prefix".into()));
    };
    let version = ip_version(first);
    if prefixes.iter().any(|p| ip_version(p) != version) {
        return Err(AppError::BadRequest("Illegal subnetpool prefixes: mixed ip versions".into()));
    }
    record.insert("ip_version".into(), json!(version));

    let max_bits: i64 = if version == 4 { 32 } else { 128 };
    let is_unspecified = |k: &str| unspecified.iter().any(|u| u == k);
    let get = |r: &Record, k: &str| r.get(k).and_then(Value::as_i64);

    let min = if is_unspecified("min_prefixlen") {
        if version == 4 { 8 } else { 64 }
    } else {
        get(record, "min_prefixlen").unwrap_or(0)
    };
    let max = if is_unspecified("max_prefixlen") {
        max_bits
    } else {
        get(record, "max_prefixlen").unwrap_or(max_bits)
    };
    let default = if is_unspecified("default_prefixlen") {
        min
    } else {
        get(record, "default_prefixlen").unwrap_or(min)
    };
    if !(min <= default && default <= max && max <= max_bits) {
        return Err(AppError::BadRequest(format!(
            "Illegal prefix bounds: min_prefixlen={}, default_prefixlen={}, max_prefixlen={}",
            min, default, max
        )));
    }
    record.insert("min_prefixlen".into(), json!(min));
    record.insert("max_prefixlen".into(), json!(max));
    record.insert("default_prefixlen".into(), json!(default));
    Ok(())
}
