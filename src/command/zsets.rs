//! Sorted set commands

use bytes::Bytes;

use super::{eq_ignore_case, int_reply, parse_float, parse_int, resolve_range, CommandResult};
use crate::error::CommandError;
use crate::keyspace::{Keyspace, SortedSet, Value};
use crate::protocol::WireValue;

/// `ZADD key score member [score member ...]`: returns the number of new members
pub(super) fn zadd(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let pairs = &args[1..];
    if pairs.len() % 2 != 0 {
        return Err(CommandError::Syntax);
    }
    // Validate every score before touching the keyspace
    let parsed = pairs
        .chunks_exact(2)
        .map(|pair| parse_float(&pair[0]).map(|score| (score, pair[1].clone())))
        .collect::<Result<Vec<_>, _>>()?;

    let zset = match ks.get_or_insert_with(&args[0], || Value::ZSet(SortedSet::new())) {
        Value::ZSet(zset) => zset,
        _ => return Err(CommandError::WrongType),
    };
    let added = parsed
        .into_iter()
        .filter(|(score, member)| zset.insert(member.clone(), *score))
        .count();
    Ok(int_reply(added))
}

pub(super) fn zrem(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let key = &args[0];
    let removed = match ks.get_mut(key) {
        Some(Value::ZSet(zset)) => args[1..].iter().filter(|m| zset.remove(m)).count(),
        Some(_) => return Err(CommandError::WrongType),
        None => 0,
    };
    ks.remove_if_empty(key);
    Ok(int_reply(removed))
}

/// `ZREVRANGE key start stop [WITHSCORES]`
pub(super) fn zrevrange(ks: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let (start, stop) = (parse_int(&args[1])?, parse_int(&args[2])?);
    let with_scores = match args.get(3) {
        Some(flag) if eq_ignore_case(flag, "WITHSCORES") => true,
        Some(_) => return Err(CommandError::Syntax),
        None => false,
    };

    let ordered = match ks.get(&args[0]) {
        Some(Value::ZSet(zset)) => zset.descending(),
        Some(_) => return Err(CommandError::WrongType),
        None => return Ok(WireValue::Array(Vec::new())),
    };

    let mut items = Vec::new();
    if let Some((from, to)) = resolve_range(start, stop, ordered.len()) {
        for (member, score) in &ordered[from..=to] {
            items.push(member.clone());
            if with_scores {
                items.push(Bytes::from(format_score(*score)));
            }
        }
    }
    Ok(WireValue::bulk_array(items))
}

fn format_score(score: f64) -> String {
    if score.is_infinite() {
        return if score > 0.0 { "inf".into() } else { "-inf".into() };
    }
    score.to_string()
}
