//! Generic key commands

use bytes::Bytes;

use super::{int_reply, parse_int, scan_reply, CommandResult, ScanArgs};
use crate::error::CommandError;
use crate::keyspace::{now_ms, Keyspace, Ttl};
use crate::protocol::WireValue;

pub(super) fn del(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(int_reply(args.iter().filter(|key| ks.remove(key)).count()))
}

pub(super) fn exists(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(int_reply(args.iter().filter(|key| ks.contains(key)).count()))
}

/// A non-positive timeout deletes the key right away
pub(super) fn expire(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let key = &args[0];
    let seconds = parse_int(&args[1])?;
    if seconds <= 0 {
        return Ok(WireValue::Integer(ks.remove(key) as i64));
    }
    let ms = seconds
        .checked_mul(1000)
        .ok_or(CommandError::InvalidExpire("expire"))?;
    let at = now_ms().saturating_add(ms as u64);
    Ok(WireValue::Integer(ks.expire_at(key, at) as i64))
}

/// `PEXPIREAT key unix-ms`; a deadline in the past deletes the key
pub(super) fn pexpireat(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let key = &args[0];
    let at = parse_int(&args[1])?;
    if at <= 0 || at as u64 <= now_ms() {
        return Ok(WireValue::Integer(ks.remove(key) as i64));
    }
    Ok(WireValue::Integer(ks.expire_at(key, at as u64) as i64))
}

pub(super) fn ttl(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let reply = match ks.ttl(&args[0]) {
        Ttl::Missing => -2,
        Ttl::Persistent => -1,
        Ttl::Remaining(ms) => ((ms + 500) / 1000) as i64,
    };
    Ok(WireValue::Integer(reply))
}

pub(super) fn type_of(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let name = ks.get(&args[0]).map_or("none", |value| value.type_name());
    Ok(WireValue::status(name))
}

pub(super) fn keys(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(WireValue::bulk_array(ks.keys(&args[0])))
}

pub(super) fn scan(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let scan = ScanArgs::parse(args)?;
    let (next, page) = ks.scan(scan.cursor, scan.pattern, scan.count);
    Ok(scan_reply(next, page))
}
