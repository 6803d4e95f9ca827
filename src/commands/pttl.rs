use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::reply::Reply;
use crate::store::{self, Store};

/// Like TTL this command returns the remaining time to live of a key that has an expire set, with
/// the sole difference that TTL returns the amount of remaining time in seconds while PTTL returns
/// it in milliseconds.
///
/// Ref: <https://redis.io/docs/latest/commands/pttl/>
#[derive(Debug, PartialEq)]
pub struct Pttl {
    pub key: String,
}

impl Executable for Pttl {
    fn exec(self, store: &mut Store) -> Reply {
        let ttl = match store.ttl(&self.key) {
            store::Ttl::Missing => -2,
            store::Ttl::Persistent => -1,
            store::Ttl::Remaining(remaining) => {
                i64::try_from(remaining.as_millis()).unwrap_or(i64::MAX)
            }
        };
        Reply::Integer(ttl)
    }
}

impl TryFrom<&mut CommandParser> for Pttl {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        parser.finish()?;
        Ok(Self { key })
    }
}
