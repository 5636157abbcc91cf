//! Connection and server commands

use bytes::Bytes;

use super::{eq_ignore_case, parse_int, CommandResult, Session};
use crate::error::CommandError;
use crate::keyspace::Keyspace;
use crate::protocol::WireValue;

pub(super) fn ping(args: &[Bytes]) -> CommandResult {
    Ok(match args.first() {
        Some(message) => WireValue::bulk(message.clone()),
        None => WireValue::status("PONG"),
    })
}

pub(super) fn echo(args: &[Bytes]) -> CommandResult {
    Ok(WireValue::bulk(args[0].clone()))
}

/// Only database 0 exists
pub(super) fn select(args: &[Bytes]) -> CommandResult {
    match parse_int(&args[0])? {
        0 => Ok(WireValue::ok()),
        _ => Err(CommandError::Other("DB index is out of range".into())),
    }
}

pub(super) fn client(session: &mut Session, args: &[Bytes]) -> CommandResult {
    let sub = &args[0];
    if eq_ignore_case(sub, "SETNAME") {
        let name = args.get(1).ok_or(CommandError::Arity("client|setname"))?;
        if name.iter().any(|b| b.is_ascii_whitespace()) {
            return Err(CommandError::Other(
                "Client names cannot contain spaces, newlines or special characters.".into(),
            ));
        }
        session.name = (!name.is_empty()).then(|| name.clone());
        Ok(WireValue::ok())
    } else if eq_ignore_case(sub, "GETNAME") {
        Ok(match &session.name {
            Some(name) => WireValue::bulk(name.clone()),
            None => WireValue::null(),
        })
    } else {
        Err(CommandError::Other(format!(
            "unknown subcommand '{}'",
            String::from_utf8_lossy(sub)
        )))
    }
}

/// `CONFIG GET` answers with an empty list; nothing is tunable at runtime
pub(super) fn config(args: &[Bytes]) -> CommandResult {
    if eq_ignore_case(&args[0], "GET") {
        if args.len() < 2 {
            return Err(CommandError::Arity("config|get"));
        }
        return Ok(WireValue::Array(Vec::new()));
    }
    Err(CommandError::Other(format!(
        "unknown subcommand '{}'",
        String::from_utf8_lossy(&args[0])
    )))
}

pub(super) fn info(ks: &mut Keyspace) -> CommandResult {
    let text = format!(
        "# Server\r\nringkv_version:{}\r\n\r\n# Keyspace\r\ndb0:keys={}\r\n",
        crate::VERSION,
        ks.len()
    );
    Ok(WireValue::bulk(text))
}

pub(super) fn quit(session: &mut Session) -> CommandResult {
    session.quit = true;
    Ok(WireValue::ok())
}
