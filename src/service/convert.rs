//! Value converters applied to request attributes before validation.

use crate::attributes::Converter;
use crate::error::AppError;
use crate::service::validation::shown;
use serde_json::{Map, Value};

pub fn convert(converter: Converter, v: Value) -> Result<Value, AppError> {
    match converter {
        Converter::ToBoolean => to_boolean(v),
        Converter::ToBooleanIfNotNone => if_not_none(v, to_boolean),
        Converter::ToInt => to_int(v),
        Converter::ToIntIfNotNone => if_not_none(v, to_int),
        Converter::NoneToEmptyList => Ok(if v.is_null() { Value::Array(Vec::new()) } else { v }),
        Converter::NoneToEmptyDict => Ok(if v.is_null() { Value::Object(Map::new()) } else { v }),
        Converter::ToList => Ok(to_list(v)),
        Converter::KvpStrToList => kvp_str_to_list(v),
        Converter::KvpListToDict => kvp_list_to_dict(v),
    }
}

fn if_not_none(v: Value, f: fn(Value) -> Result<Value, AppError>) -> Result<Value, AppError> {
    if v.is_null() {
        Ok(v)
    } else {
        f(v)
    }
}

fn to_boolean(v: Value) -> Result<Value, AppError> {
    let b = match &v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    b.map(Value::Bool)
        .ok_or_else(|| AppError::BadRequest(format!("'{}' cannot be converted to boolean", shown(&v))))
}

fn to_int(v: Value) -> Result<Value, AppError> {
    let n = match &v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    n.map(|n| Value::Number(n.into()))
        .ok_or_else(|| AppError::BadRequest(format!("'{}' is not an integer", shown(&v))))
}

fn to_list(v: Value) -> Value {
    match v {
        Value::Null => Value::Array(Vec::new()),
        Value::Array(_) => v,
        Value::Object(m) => Value::Array(m.into_iter().map(|(k, _)| Value::String(k)).collect()),
        other => Value::Array(vec![other]),
    }
}

/// `"a=1,b=2"` to `["a=1", "b=2"]`.
fn kvp_str_to_list(v: Value) -> Result<Value, AppError> {
    let s = v
        .as_str()
        .ok_or_else(|| AppError::BadRequest(format!("'{}' is not a string", shown(&v))))?;
    let mut out = Vec::new();
    for kvp in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if !kvp.contains('=') {
            return Err(AppError::BadRequest(format!("'{}' is not of the form <key>=[value]", kvp)));
        }
        out.push(Value::String(kvp.to_string()));
    }
    Ok(Value::Array(out))
}

/// `["ip_address=10.0.0.3", "subnet_id=..."]` to `{"ip_address": ["10.0.0.3"], "subnet_id": [...]}`.
fn kvp_list_to_dict(v: Value) -> Result<Value, AppError> {
    let items = match v {
        Value::Array(items) => items,
        Value::String(s) => vec![Value::String(s)],
        other => return Err(AppError::BadRequest(format!("'{}' is not a list", shown(&other)))),
    };
    let mut out: Map<String, Value> = Map::new();
    for item in items {
        let s = shown(&item);
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| AppError::BadRequest(format!("'{}' is not of the form <key>=[value]", s)))?;
        let entry = out
            .entry(key.trim().to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = entry {
            let value = Value::String(value.trim().to_string());
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    Ok(Value::Object(out))
}
