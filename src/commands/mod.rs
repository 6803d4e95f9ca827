pub mod command;
pub mod executable;
pub mod get;
pub mod pttl;
pub mod set;
pub mod ttl;

use std::str::FromStr;
use std::vec;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::reply::Reply;
use crate::store::Store;

use command::Command as Command_;
use get::Get;
use pttl::Pttl;
use set::Set;
use ttl::Ttl;

/// The registry of supported command names. Names are matched exactly, so `get` is not `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum CommandKind {
    Command,
    Get,
    Set,
    Ttl,
    Pttl,
}

impl CommandKind {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Command(Command_),
    Get(Get),
    Pttl(Pttl),
    Set(Set),
    Ttl(Ttl),
}

impl Executable for Command {
    fn exec(self, store: &mut Store) -> Reply {
        match self {
            Command::Command(cmd) => cmd.exec(store),
            Command::Get(cmd) => cmd.exec(store),
            Command::Pttl(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
            Command::Ttl(cmd) => cmd.exec(store),
        }
    }
}

impl TryFrom<Vec<String>> for Command {
    type Error = CommandError;

    fn try_from(request: Vec<String>) -> Result<Self, Self::Error> {
        let mut parts = request.into_iter();
        // An empty request has no name, and is reported as an unknown command.
        let command_name = parts.next().unwrap_or_default();

        let Ok(kind) = CommandKind::from_str(&command_name) else {
            return Err(CommandError::UnknownCommand {
                command: command_name,
                args: parts.collect(),
            });
        };

        let parser = &mut CommandParser { kind, parts };

        match kind {
            CommandKind::Command => Command_::try_from(parser).map(Command::Command),
            CommandKind::Get => Get::try_from(parser).map(Command::Get),
            CommandKind::Pttl => Pttl::try_from(parser).map(Command::Pttl),
            CommandKind::Set => Set::try_from(parser).map(Command::Set),
            CommandKind::Ttl => Ttl::try_from(parser).map(Command::Ttl),
        }
    }
}

/// Runs one request against the store. Errors never escape: unknown commands and invalid
/// arguments become error replies and leave the store untouched.
pub fn dispatch(request: Vec<String>, store: &mut Store) -> Reply {
    match Command::try_from(request) {
        Ok(cmd) => cmd.exec(store),
        Err(err) => Reply::Error(err.to_string()),
    }
}

pub(crate) struct CommandParser {
    kind: CommandKind,
    parts: vec::IntoIter<String>,
}

impl CommandParser {
    pub(crate) fn kind(&self) -> CommandKind {
        self.kind
    }

    /// The next argument. Running out of arguments is an arity error.
    fn next_string(&mut self) -> Result<String, CommandError> {
        self.parts.next().ok_or(CommandError::WrongArity {
            command: self.kind.name(),
        })
    }

    fn next_optional(&mut self) -> Option<String> {
        self.parts.next()
    }

    fn next_integer(&mut self) -> Result<i64, CommandError> {
        self.parts
            .next()
            .ok_or(CommandError::Syntax)?
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger)
    }

    /// Fails with an arity error if any argument is left unconsumed.
    fn finish(&mut self) -> Result<(), CommandError> {
        match self.parts.next() {
            Some(_) => Err(CommandError::WrongArity {
                command: self.kind.name(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandError {
    #[error("ERR unknown command `{command}`, with args beginning with: {}", quoted_args(.args))]
    UnknownCommand { command: String, args: Vec<String> },
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongArity { command: &'static str },
    #[error("ERR syntax error")]
    Syntax,
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
    #[error("ERR invalid expire time in '{command}' command")]
    InvalidExpireTime { command: &'static str },
}

fn quoted_args(args: &[String]) -> String {
    args.iter().map(|arg| format!("`{arg}`, ")).collect()
}
