//! List commands

use std::collections::VecDeque;

use bytes::Bytes;

use super::{int_reply, parse_int, resolve_range, CommandResult};
use crate::error::CommandError;
use crate::keyspace::{Keyspace, Value};
use crate::protocol::WireValue;

/// Which end of the list a push targets
#[derive(Clone, Copy)]
pub(super) enum End {
    Front,
    Back,
}

fn list_or_create<'a>(ks: &'a mut Keyspace, key: &Bytes) -> Result<&'a mut VecDeque<Bytes>, CommandError> {
    match ks.get_or_insert_with(key, || Value::List(VecDeque::new())) {
        Value::List(list) => Ok(list),
        _ => Err(CommandError::WrongType),
    }
}

/// `LPUSH` / `RPUSH`: returns the new length
pub(super) fn push(ks: &mut Keyspace, args: &[Bytes], end: End) -> CommandResult {
    let list = list_or_create(ks, &args[0])?;
    for item in &args[1..] {
        match end {
            End::Front => list.push_front(item.clone()),
            End::Back => list.push_back(item.clone()),
        }
    }
    Ok(int_reply(list.len()))
}

pub(super) fn lrange(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let (start, stop) = (parse_int(&args[1])?, parse_int(&args[2])?);
    let list = match ks.get(&args[0]) {
        Some(Value::List(list)) => list,
        Some(_) => return Err(CommandError::WrongType),
        None => return Ok(WireValue::Array(Vec::new())),
    };
    let items = match resolve_range(start, stop, list.len()) {
        Some((from, to)) => list.range(from..=to).cloned().collect(),
        None => Vec::new(),
    };
    Ok(WireValue::bulk_array(items))
}

/// `LREM key count element`
///
/// `count > 0` removes from the head, `count < 0` from the tail, `0` removes
/// every occurrence.
pub(super) fn lrem(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let key = &args[0];
    let count = parse_int(&args[1])?;
    let element = &args[2];

    let list = match ks.get_mut(key) {
        Some(Value::List(list)) => list,
        Some(_) => return Err(CommandError::WrongType),
        None => return Ok(WireValue::Integer(0)),
    };

    let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
    let mut removed = 0;
    if count >= 0 {
        let mut i = 0;
        while i < list.len() && removed < limit {
            if list[i] == *element {
                list.remove(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
    } else {
        let mut i = list.len();
        while i > 0 && removed < limit {
            i -= 1;
            if list[i] == *element {
                list.remove(i);
                removed += 1;
            }
        }
    }

    ks.remove_if_empty(key);
    Ok(int_reply(removed))
}
