//! String commands

use bytes::Bytes;

use super::{eq_ignore_case, parse_int, CommandResult};
use crate::error::CommandError;
use crate::keyspace::{now_ms, Keyspace, Value};
use crate::protocol::WireValue;

/// Existence condition of `SET ... NX|XX`
#[derive(Clone, Copy, PartialEq, Eq)]
enum Condition {
    IfMissing,
    IfExists,
}

/// `SET key value [EX seconds | PX milliseconds | EXAT unix-s | PXAT unix-ms] [NX | XX]`
pub(super) fn set(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let (key, value) = (&args[0], &args[1]);
    let mut expires_at: Option<u64> = None;
    let mut condition: Option<Condition> = None;

    let mut options = args[2..].iter();
    while let Some(option) = options.next() {
        let unit_ms = if eq_ignore_case(option, "EX") || eq_ignore_case(option, "EXAT") {
            Some(1000)
        } else if eq_ignore_case(option, "PX") || eq_ignore_case(option, "PXAT") {
            Some(1)
        } else {
            None
        };

        if let Some(unit_ms) = unit_ms {
            if expires_at.is_some() {
                return Err(CommandError::Syntax);
            }
            let amount = parse_int(options.next().ok_or(CommandError::Syntax)?)?;
            if amount <= 0 {
                return Err(CommandError::InvalidExpire("set"));
            }
            let ms = amount
                .checked_mul(unit_ms)
                .ok_or(CommandError::InvalidExpire("set"))? as u64;
            let absolute = eq_ignore_case(option, "EXAT") || eq_ignore_case(option, "PXAT");
            expires_at = Some(if absolute { ms } else { now_ms().saturating_add(ms) });
        } else if eq_ignore_case(option, "NX") || eq_ignore_case(option, "XX") {
            if condition.is_some() {
                return Err(CommandError::Syntax);
            }
            condition = Some(if eq_ignore_case(option, "NX") {
                Condition::IfMissing
            } else {
                Condition::IfExists
            });
        } else {
            return Err(CommandError::Syntax);
        }
    }

    let exists = ks.contains(key);
    match condition {
        Some(Condition::IfMissing) if exists => return Ok(WireValue::null()),
        Some(Condition::IfExists) if !exists => return Ok(WireValue::null()),
        _ => {}
    }

    ks.set(key.clone(), Value::Str(value.clone()), expires_at);
    Ok(WireValue::ok())
}

pub(super) fn get(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    match ks.get(&args[0]) {
        Some(Value::Str(s)) => Ok(WireValue::bulk(s.clone())),
        Some(_) => Err(CommandError::WrongType),
        None => Ok(WireValue::null()),
    }
}

pub(super) fn setnx(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    if ks.contains(&args[0]) {
        return Ok(WireValue::Integer(0));
    }
    ks.set(args[0].clone(), Value::Str(args[1].clone()), None);
    Ok(WireValue::Integer(1))
}

/// `SETEX key seconds value`
pub(super) fn setex(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let seconds = parse_int(&args[1])?;
    let ms = match seconds.checked_mul(1000) {
        Some(ms) if seconds > 0 => ms,
        _ => return Err(CommandError::InvalidExpire("setex")),
    };
    let expires_at = now_ms().saturating_add(ms as u64);
    ks.set(args[0].clone(), Value::Str(args[2].clone()), Some(expires_at));
    Ok(WireValue::ok())
}

pub(super) fn mset(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    if args.len() % 2 != 0 {
        return Err(CommandError::Arity("mset"));
    }
    for pair in args.chunks_exact(2) {
        ks.set(pair[0].clone(), Value::Str(pair[1].clone()), None);
    }
    Ok(WireValue::ok())
}

/// Keys that are missing or hold another type yield null
pub(super) fn mget(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let values = args
        .iter()
        .map(|key| match ks.get(key) {
            Some(Value::Str(s)) => WireValue::bulk(s.clone()),
            _ => WireValue::null(),
        })
        .collect();
    Ok(WireValue::Array(values))
}

/// Shared body of `INCR` / `DECR`. The key keeps its expiry.
pub(super) fn incr_by(ks: &mut Keyspace, key: &Bytes, delta: i64) -> CommandResult {
    match ks.get_mut(key) {
        Some(Value::Str(current)) => {
            let next = parse_int(current)?
                .checked_add(delta)
                .ok_or(CommandError::Overflow)?;
            *current = Bytes::from(next.to_string());
            Ok(WireValue::Integer(next))
        }
        Some(_) => Err(CommandError::WrongType),
        None => {
            ks.set(key.clone(), Value::Str(Bytes::from(delta.to_string())), None);
            Ok(WireValue::Integer(delta))
        }
    }
}
