use strum::IntoEnumIterator;

use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandKind, CommandParser};
use crate::reply::Reply;
use crate::store::Store;

/// Lists the names of the commands this server understands.
///
/// Ref: <https://redis.io/docs/latest/commands/command/>
#[derive(Debug, PartialEq)]
pub struct Command {}

impl Executable for Command {
    fn exec(self, _store: &mut Store) -> Reply {
        let names = CommandKind::iter()
            .map(|kind| Reply::Bulk(kind.name().to_string()))
            .collect();

        Reply::Array(names)
    }
}

impl TryFrom<&mut CommandParser> for Command {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.finish()?;
        Ok(Self {})
    }
}
