//! Slash-command parsing for the interactive terminal.
//!
//! Only commands that drive the engine are interpreted here. Anything
//! unrecognized is reported as `Unknown` so the front end can forward it to
//! the remote node, which has a slash-command namespace of its own.

use ax25core::address::{Callsign, DigiPath};

use crate::error::TermError;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    Connect { peer: Callsign, path: DigiPath },
    Disconnect,
    /// One-shot UI transmission.
    UnprotoOnce {
        dest: Callsign,
        path: DigiPath,
        message: String,
    },
    /// Enter persistent UNPROTO mode: subsequent plain lines become UI frames.
    UnprotoEnter { dest: Callsign, path: DigiPath },
    UnprotoExit,
    Retries(u8),
    Echo(bool),
    Crlf(bool),
    Debug,
    Status,
    Clear,
    Help,
    Quit,
    Unknown,
}

/// Parse a line that begins with `/`.
pub fn parse(line: &str) -> Result<Command, TermError> {
    let mut tokens = line.strip_prefix('/').unwrap_or(line).split_whitespace();
    let word = tokens.next().unwrap_or("").to_ascii_lowercase();
    let rest: Vec<&str> = tokens.collect();
    match word.as_str() {
        "connect" | "c" => {
            let (peer, path, trailing) =
                destination(&rest, "/connect CALL [via DIGI1,DIGI2]")?;
            if !trailing.is_empty() {
                return Err(TermError::Usage("/connect CALL [via DIGI1,DIGI2]"));
            }
            Ok(Command::Connect { peer, path })
        }
        "disconnect" | "d" | "bye" => Ok(Command::Disconnect),
        "unproto" | "u" => {
            let (dest, path, trailing) =
                destination(&rest, "/unproto DEST [via DIGI1,DIGI2] [message]")?;
            if trailing.is_empty() {
                Ok(Command::UnprotoEnter { dest, path })
            } else {
                Ok(Command::UnprotoOnce {
                    dest,
                    path,
                    message: trailing.join(" "),
                })
            }
        }
        "upexit" | "ex" => Ok(Command::UnprotoExit),
        "retries" => {
            let n: u8 = rest
                .first()
                .and_then(|t| t.parse().ok())
                .ok_or(TermError::Usage("/retries N (1-10)"))?;
            Ok(Command::Retries(n.clamp(1, 10)))
        }
        "echo" => Ok(Command::Echo(on_off(&rest, "/echo on|off")?)),
        "crlf" => Ok(Command::Crlf(on_off(&rest, "/crlf on|off")?)),
        "debug" => Ok(Command::Debug),
        "status" => Ok(Command::Status),
        "clear" => Ok(Command::Clear),
        "help" | "?" => Ok(Command::Help),
        "quit" | "q" => Ok(Command::Quit),
        _ => Ok(Command::Unknown),
    }
}

/// Parse `CALL [via DIGI1,DIGI2]`, returning any tokens left over.
fn destination<'a>(
    rest: &[&'a str],
    usage: &'static str,
) -> Result<(Callsign, DigiPath, Vec<&'a str>), TermError> {
    let target = rest.first().ok_or(TermError::Usage(usage))?;
    let peer = callsign(target)?;
    let mut path = DigiPath::new();
    let mut index = 1;
    if rest.get(1).is_some_and(|t| t.eq_ignore_ascii_case("via")) {
        let list = rest.get(2).ok_or(TermError::Usage(usage))?;
        for hop in list.split(',').filter(|h| !h.is_empty()) {
            path.push(callsign(hop)?).map_err(|reason| {
                TermError::InvalidCallsign {
                    callsign: hop.to_string(),
                    reason,
                }
            })?;
        }
        index = 3;
    }
    Ok((peer, path, rest[index.min(rest.len())..].to_vec()))
}

fn callsign(token: &str) -> Result<Callsign, TermError> {
    Callsign::parse(token).map_err(|reason| TermError::InvalidCallsign {
        callsign: token.to_string(),
        reason,
    })
}

fn on_off(rest: &[&str], usage: &'static str) -> Result<bool, TermError> {
    match rest.first().map(|t| t.to_ascii_lowercase()).as_deref() {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err(TermError::Usage(usage)),
    }
}
