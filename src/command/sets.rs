//! Set commands

use std::collections::HashSet;

use bytes::Bytes;

use super::{int_reply, scan_reply, CommandResult, ScanArgs};
use crate::error::CommandError;
use crate::keyspace::{paginate, Keyspace, Value};

pub(super) fn sadd(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let set = match ks.get_or_insert_with(&args[0], || Value::Set(HashSet::new())) {
        Value::Set(set) => set,
        _ => return Err(CommandError::WrongType),
    };
    let added = args[1..].iter().filter(|m| set.insert((*m).clone())).count();
    Ok(int_reply(added))
}

pub(super) fn srem(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let key = &args[0];
    let removed = match ks.get_mut(key) {
        Some(Value::Set(set)) => args[1..].iter().filter(|m| set.remove(*m)).count(),
        Some(_) => return Err(CommandError::WrongType),
        None => 0,
    };
    ks.remove_if_empty(key);
    Ok(int_reply(removed))
}

pub(super) fn sscan(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let scan = ScanArgs::parse(&args[1..])?;
    let members = match ks.get(&args[0]) {
        Some(Value::Set(set)) => {
            let mut members: Vec<Bytes> = set.iter().cloned().collect();
            members.sort();
            members
        }
        Some(_) => return Err(CommandError::WrongType),
        None => Vec::new(),
    };
    let (next, page) = paginate(members, scan.cursor, scan.pattern, scan.count);
    Ok(scan_reply(next, page))
}
