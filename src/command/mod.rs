//! Command Module
//!
//! Turns a decoded command batch into a typed command and runs it against
//! the keyspace.
//!
//! ## Responsibilities
//! - Normalize request tokens (bulk arrays and inline lines)
//! - Resolve command names case-insensitively and check arity
//! - Classify write commands, the only ones persisted to the log
//! - Render failures as `-ERR` / `-WRONGTYPE` replies

mod hashes;
mod keys;
mod lists;
mod server;
mod sets;
mod strings;
mod zsets;

use bytes::Bytes;

use crate::error::CommandError;
use crate::keyspace::Keyspace;
use crate::protocol::WireValue;

/// Outcome of one command handler
pub type CommandResult = std::result::Result<WireValue, CommandError>;

/// Unbounded arity marker
const VARIADIC: usize = usize::MAX;

/// Unknown command names are echoed back cut to this many bytes
const MAX_NAME_IN_ERROR: usize = 128;

/// Every command the server understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    // Connection / server
    Ping,
    Echo,
    Select,
    Auth,
    Client,
    Config,
    Info,
    Quit,

    // Keys
    Del,
    Exists,
    Expire,
    PExpireAt,
    Ttl,
    Type,
    Keys,
    Scan,

    // Strings
    Set,
    Get,
    SetNx,
    SetEx,
    MSet,
    MGet,
    Incr,
    Decr,

    // Lists
    LPush,
    RPush,
    LRange,
    LRem,

    // Hashes
    HSet,
    HGet,
    HDel,
    HScan,

    // Sets
    SAdd,
    SRem,
    SScan,

    // Sorted sets
    ZAdd,
    ZRem,
    ZRevRange,
}

impl CommandKind {
    /// Resolve a command name, ignoring ASCII case
    pub fn parse(name: &[u8]) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let kind = match upper.as_slice() {
            b"PING" => CommandKind::Ping,
            b"ECHO" => CommandKind::Echo,
            b"SELECT" => CommandKind::Select,
            b"AUTH" => CommandKind::Auth,
            b"CLIENT" => CommandKind::Client,
            b"CONFIG" => CommandKind::Config,
            b"INFO" => CommandKind::Info,
            b"QUIT" => CommandKind::Quit,
            b"DEL" => CommandKind::Del,
            b"EXISTS" => CommandKind::Exists,
            b"EXPIRE" => CommandKind::Expire,
            b"PEXPIREAT" => CommandKind::PExpireAt,
            b"TTL" => CommandKind::Ttl,
            b"TYPE" => CommandKind::Type,
            b"KEYS" => CommandKind::Keys,
            b"SCAN" => CommandKind::Scan,
            b"SET" => CommandKind::Set,
            b"GET" => CommandKind::Get,
            b"SETNX" => CommandKind::SetNx,
            b"SETEX" => CommandKind::SetEx,
            b"MSET" => CommandKind::MSet,
            b"MGET" => CommandKind::MGet,
            b"INCR" => CommandKind::Incr,
            b"DECR" => CommandKind::Decr,
            b"LPUSH" => CommandKind::LPush,
            b"RPUSH" => CommandKind::RPush,
            b"LRANGE" => CommandKind::LRange,
            b"LREM" => CommandKind::LRem,
            b"HSET" => CommandKind::HSet,
            b"HGET" => CommandKind::HGet,
            b"HDEL" => CommandKind::HDel,
            b"HSCAN" => CommandKind::HScan,
            b"SADD" => CommandKind::SAdd,
            b"SREM" => CommandKind::SRem,
            b"SSCAN" => CommandKind::SScan,
            b"ZADD" => CommandKind::ZAdd,
            b"ZREM" => CommandKind::ZRem,
            b"ZREVRANGE" => CommandKind::ZRevRange,
            _ => return None,
        };
        Some(kind)
    }

    /// Lowercase name, as used in error replies
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Ping => "ping",
            CommandKind::Echo => "echo",
            CommandKind::Select => "select",
            CommandKind::Auth => "auth",
            CommandKind::Client => "client",
            CommandKind::Config => "config",
            CommandKind::Info => "info",
            CommandKind::Quit => "quit",
            CommandKind::Del => "del",
            CommandKind::Exists => "exists",
            CommandKind::Expire => "expire",
            CommandKind::PExpireAt => "pexpireat",
            CommandKind::Ttl => "ttl",
            CommandKind::Type => "type",
            CommandKind::Keys => "keys",
            CommandKind::Scan => "scan",
            CommandKind::Set => "set",
            CommandKind::Get => "get",
            CommandKind::SetNx => "setnx",
            CommandKind::SetEx => "setex",
            CommandKind::MSet => "mset",
            CommandKind::MGet => "mget",
            CommandKind::Incr => "incr",
            CommandKind::Decr => "decr",
            CommandKind::LPush => "lpush",
            CommandKind::RPush => "rpush",
            CommandKind::LRange => "lrange",
            CommandKind::LRem => "lrem",
            CommandKind::HSet => "hset",
            CommandKind::HGet => "hget",
            CommandKind::HDel => "hdel",
            CommandKind::HScan => "hscan",
            CommandKind::SAdd => "sadd",
            CommandKind::SRem => "srem",
            CommandKind::SScan => "sscan",
            CommandKind::ZAdd => "zadd",
            CommandKind::ZRem => "zrem",
            CommandKind::ZRevRange => "zrevrange",
        }
    }

    /// Whether a successful execution must be recorded in the log
    pub fn is_write(self) -> bool {
        matches!(
            self,
            CommandKind::Set
                | CommandKind::SetNx
                | CommandKind::SetEx
                | CommandKind::MSet
                | CommandKind::Incr
                | CommandKind::Decr
                | CommandKind::Del
                | CommandKind::Expire
                | CommandKind::PExpireAt
                | CommandKind::LPush
                | CommandKind::RPush
                | CommandKind::LRem
                | CommandKind::HSet
                | CommandKind::HDel
                | CommandKind::SAdd
                | CommandKind::SRem
                | CommandKind::ZAdd
                | CommandKind::ZRem
        )
    }

    /// Accepted argument count (name excluded), inclusive bounds
    fn arity(self) -> (usize, usize) {
        match self {
            CommandKind::Ping | CommandKind::Info => (0, 1),
            CommandKind::Quit => (0, 0),
            CommandKind::Echo
            | CommandKind::Select
            | CommandKind::Ttl
            | CommandKind::Type
            | CommandKind::Keys
            | CommandKind::Get
            | CommandKind::Incr
            | CommandKind::Decr => (1, 1),
            CommandKind::Auth | CommandKind::Client => (1, 2),
            CommandKind::Config => (1, VARIADIC),
            CommandKind::Del | CommandKind::Exists | CommandKind::MGet | CommandKind::Scan => {
                (1, VARIADIC)
            }
            CommandKind::Expire | CommandKind::PExpireAt | CommandKind::SetNx | CommandKind::HGet => {
                (2, 2)
            }
            CommandKind::Set
            | CommandKind::MSet
            | CommandKind::LPush
            | CommandKind::RPush
            | CommandKind::HDel
            | CommandKind::HScan
            | CommandKind::SAdd
            | CommandKind::SRem
            | CommandKind::SScan
            | CommandKind::ZRem => (2, VARIADIC),
            CommandKind::SetEx | CommandKind::LRange | CommandKind::LRem => (3, 3),
            CommandKind::HSet | CommandKind::ZAdd => (3, VARIADIC),
            CommandKind::ZRevRange => (3, 4),
        }
    }

    fn check_arity(self, argc: usize) -> std::result::Result<(), CommandError> {
        let (min, max) = self.arity();
        if argc < min || argc > max {
            return Err(CommandError::Arity(self.name()));
        }
        Ok(())
    }
}

/// Per-connection state
#[derive(Debug, Default, Clone)]
pub struct Session {
    /// Set by `CLIENT SETNAME`
    pub name: Option<Bytes>,

    /// Set by `QUIT`; the connection closes after replying
    pub quit: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Flatten a batch into plain byte tokens.
///
/// A lone status value is an inline request (`PING`, `SET k v` typed into a
/// terminal) and is split on ASCII whitespace. Integers are accepted as their
/// decimal text; null bulks, errors and nested arrays are rejected.
pub fn tokenize(batch: &[WireValue]) -> std::result::Result<Vec<Bytes>, CommandError> {
    if let [WireValue::SimpleStatus(line)] = batch {
        return Ok(line
            .split_ascii_whitespace()
            .map(|word| Bytes::copy_from_slice(word.as_bytes()))
            .collect());
    }

    batch
        .iter()
        .map(|value| match value {
            WireValue::BulkBytes(Some(b)) => Ok(b.clone()),
            WireValue::SimpleStatus(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            WireValue::Integer(n) => Ok(Bytes::from(n.to_string())),
            _ => Err(CommandError::Other("Protocol error: invalid request token".into())),
        })
        .collect()
}

/// Resolve the command of a token list
pub fn classify(tokens: &[Bytes]) -> std::result::Result<CommandKind, CommandError> {
    let name = tokens
        .first()
        .ok_or_else(|| CommandError::Other("empty command".into()))?;
    CommandKind::parse(name).ok_or_else(|| {
        let shown = &name[..name.len().min(MAX_NAME_IN_ERROR)];
        CommandError::Unknown(String::from_utf8_lossy(shown).into_owned())
    })
}

/// Run an already classified command
pub fn execute(
    ks: &mut Keyspace,
    session: &mut Session,
    kind: CommandKind,
    tokens: &[Bytes],
) -> WireValue {
    let args = tokens.get(1..).unwrap_or(&[]);
    match dispatch(ks, session, kind, args) {
        Ok(reply) => reply,
        Err(e) => e.into(),
    }
}

fn dispatch(
    ks: &mut Keyspace,
    session: &mut Session,
    kind: CommandKind,
    args: &[Bytes],
) -> CommandResult {
    kind.check_arity(args.len())?;

    match kind {
        CommandKind::Ping => server::ping(args),
        CommandKind::Echo => server::echo(args),
        CommandKind::Select => server::select(args),
        CommandKind::Auth => Ok(WireValue::ok()),
        CommandKind::Client => server::client(session, args),
        CommandKind::Config => server::config(args),
        CommandKind::Info => server::info(ks),
        CommandKind::Quit => server::quit(session),

        CommandKind::Del => keys::del(ks, args),
        CommandKind::Exists => keys::exists(ks, args),
        CommandKind::Expire => keys::expire(ks, args),
        CommandKind::PExpireAt => keys::pexpireat(ks, args),
        CommandKind::Ttl => keys::ttl(ks, args),
        CommandKind::Type => keys::type_of(ks, args),
        CommandKind::Keys => keys::keys(ks, args),
        CommandKind::Scan => keys::scan(ks, args),

        CommandKind::Set => strings::set(ks, args),
        CommandKind::Get => strings::get(ks, args),
        CommandKind::SetNx => strings::setnx(ks, args),
        CommandKind::SetEx => strings::setex(ks, args),
        CommandKind::MSet => strings::mset(ks, args),
        CommandKind::MGet => strings::mget(ks, args),
        CommandKind::Incr => strings::incr_by(ks, &args[0], 1),
        CommandKind::Decr => strings::incr_by(ks, &args[0], -1),

        CommandKind::LPush => lists::push(ks, args, lists::End::Front),
        CommandKind::RPush => lists::push(ks, args, lists::End::Back),
        CommandKind::LRange => lists::lrange(ks, args),
        CommandKind::LRem => lists::lrem(ks, args),

        CommandKind::HSet => hashes::hset(ks, args),
        CommandKind::HGet => hashes::hget(ks, args),
        CommandKind::HDel => hashes::hdel(ks, args),
        CommandKind::HScan => hashes::hscan(ks, args),

        CommandKind::SAdd => sets::sadd(ks, args),
        CommandKind::SRem => sets::srem(ks, args),
        CommandKind::SScan => sets::sscan(ks, args),

        CommandKind::ZAdd => zsets::zadd(ks, args),
        CommandKind::ZRem => zsets::zrem(ks, args),
        CommandKind::ZRevRange => zsets::zrevrange(ks, args),
    }
}

/// Tokens to record in the log for a write that just succeeded.
///
/// Relative expiries are pinned to the deadline the keyspace now holds, so a
/// replay at any later time rebuilds the same deadlines. `None` when the
/// write changed nothing worth recording.
pub fn persisted_tokens(
    ks: &mut Keyspace,
    kind: CommandKind,
    tokens: Vec<Bytes>,
    reply: &WireValue,
) -> Option<Vec<Bytes>> {
    let has_relative_ttl = || {
        tokens[3..]
            .iter()
            .any(|t| eq_ignore_case(t, "EX") || eq_ignore_case(t, "PX"))
    };

    match kind {
        CommandKind::Set if has_relative_ttl() => {
            if *reply != WireValue::ok() {
                return None;
            }
            let (key, value) = (tokens[1].clone(), tokens[2].clone());
            Some(absolute_set(ks, key, value))
        }
        CommandKind::SetEx => {
            let (key, value) = (tokens[1].clone(), tokens[3].clone());
            Some(absolute_set(ks, key, value))
        }
        CommandKind::Expire => {
            if *reply != WireValue::Integer(1) {
                return None;
            }
            let key = tokens[1].clone();
            match ks.expires_at(&key) {
                Some(at) => Some(vec![
                    Bytes::from_static(b"PEXPIREAT"),
                    key,
                    Bytes::from(at.to_string()),
                ]),
                // A non-positive timeout deleted the key
                None => Some(vec![Bytes::from_static(b"DEL"), key]),
            }
        }
        _ => Some(tokens),
    }
}

fn absolute_set(ks: &Keyspace, key: Bytes, value: Bytes) -> Vec<Bytes> {
    let mut tokens = vec![Bytes::from_static(b"SET"), key.clone(), value];
    if let Some(at) = ks.expires_at(&key) {
        tokens.push(Bytes::from_static(b"PXAT"));
        tokens.push(Bytes::from(at.to_string()));
    }
    tokens
}

impl From<CommandError> for WireValue {
    fn from(e: CommandError) -> Self {
        WireValue::Error(e.to_string())
    }
}

// =============================================================================
// Argument Helpers
// =============================================================================

fn eq_ignore_case(arg: &[u8], word: &str) -> bool {
    arg.eq_ignore_ascii_case(word.as_bytes())
}

fn parse_int(arg: &[u8]) -> std::result::Result<i64, CommandError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::NotInteger)
}

fn parse_float(arg: &[u8]) -> std::result::Result<f64, CommandError> {
    let value: f64 = std::str::from_utf8(arg)
        .ok()
        .and_then(|s| match s.to_ascii_lowercase().as_str() {
            "+inf" | "inf" => Some(f64::INFINITY),
            "-inf" => Some(f64::NEG_INFINITY),
            other => other.parse().ok(),
        })
        .ok_or(CommandError::NotFloat)?;
    if value.is_nan() {
        return Err(CommandError::NotFloat);
    }
    Ok(value)
}

fn int_reply(n: usize) -> WireValue {
    WireValue::Integer(n as i64)
}

/// Resolve an inclusive `[start, stop]` range with negative indices counted
/// from the end. `None` when the range selects nothing.
fn resolve_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// `cursor [MATCH pattern] [COUNT n]`
struct ScanArgs<'a> {
    cursor: usize,
    pattern: Option<&'a [u8]>,
    count: usize,
}

impl<'a> ScanArgs<'a> {
    const DEFAULT_COUNT: usize = 10;

    fn parse(args: &'a [Bytes]) -> std::result::Result<Self, CommandError> {
        let (cursor, options) = args.split_first().ok_or(CommandError::Syntax)?;
        let cursor = std::str::from_utf8(cursor)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or(CommandError::InvalidCursor)?;

        let mut scan = ScanArgs { cursor, pattern: None, count: Self::DEFAULT_COUNT };
        let mut options = options.iter();
        while let Some(option) = options.next() {
            let value = options.next().ok_or(CommandError::Syntax)?;
            if eq_ignore_case(option, "MATCH") {
                scan.pattern = Some(value.as_ref());
            } else if eq_ignore_case(option, "COUNT") {
                let count = parse_int(value)?;
                if count < 1 {
                    return Err(CommandError::Syntax);
                }
                scan.count = count as usize;
            } else {
                return Err(CommandError::Syntax);
            }
        }
        Ok(scan)
    }
}

/// `[next_cursor, [items...]]`
fn scan_reply(next: usize, items: Vec<Bytes>) -> WireValue {
    WireValue::Array(vec![
        WireValue::bulk(next.to_string()),
        WireValue::bulk_array(items),
    ])
}
