//! Hash commands

use std::collections::HashMap;

use bytes::Bytes;

use super::{int_reply, scan_reply, CommandResult, ScanArgs};
use crate::error::CommandError;
use crate::keyspace::{paginate, Keyspace, Value};
use crate::protocol::WireValue;

/// `HSET key field value [field value ...]`: returns the number of new fields
pub(super) fn hset(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let pairs = &args[1..];
    if pairs.len() % 2 != 0 {
        return Err(CommandError::Arity("hset"));
    }

    let hash = match ks.get_or_insert_with(&args[0], || Value::Hash(HashMap::new())) {
        Value::Hash(hash) => hash,
        _ => return Err(CommandError::WrongType),
    };
    let added = pairs
        .chunks_exact(2)
        .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
        .count();
    Ok(int_reply(added))
}

pub(super) fn hget(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    match ks.get(&args[0]) {
        Some(Value::Hash(hash)) => Ok(hash
            .get(&args[1])
            .map_or_else(WireValue::null, |v| WireValue::bulk(v.clone()))),
        Some(_) => Err(CommandError::WrongType),
        None => Ok(WireValue::null()),
    }
}

pub(super) fn hdel(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let key = &args[0];
    let removed = match ks.get_mut(key) {
        Some(Value::Hash(hash)) => args[1..].iter().filter(|f| hash.remove(*f).is_some()).count(),
        Some(_) => return Err(CommandError::WrongType),
        None => 0,
    };
    ks.remove_if_empty(key);
    Ok(int_reply(removed))
}

/// `HSCAN key cursor [MATCH pattern] [COUNT n]`: the page lists field, value pairs
pub(super) fn hscan(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let scan = ScanArgs::parse(&args[1..])?;
    let hash = match ks.get(&args[0]) {
        Some(Value::Hash(hash)) => hash,
        Some(_) => return Err(CommandError::WrongType),
        None => return Ok(scan_reply(0, Vec::new())),
    };

    let mut fields: Vec<Bytes> = hash.keys().cloned().collect();
    fields.sort();
    let (next, page) = paginate(fields, scan.cursor, scan.pattern, scan.count);

    let mut items = Vec::with_capacity(page.len() * 2);
    for field in page {
        if let Some(value) = hash.get(&field).cloned() {
            items.push(field);
            items.push(value);
        }
    }
    Ok(scan_reply(next, items))
}
