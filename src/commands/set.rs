use std::time::Duration;

use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::reply::Reply;
use crate::store::Store;
use crate::time::now_millis;

/// Set `key` to hold the string `value`. If `key` already holds a value, it is overwritten and
/// any previous time to live associated with the key is discarded.
///
/// Options:
///
/// * `EX seconds` -- Set the specified expire time, in seconds (a positive integer).
/// * `PX milliseconds` -- Set the specified expire time, in milliseconds (a positive integer).
///
/// Only one expire option is accepted per command. The resulting expiration time must fit in a
/// signed 64-bit count of milliseconds since the Unix epoch.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: String,
    pub expiration: Option<Duration>,
}

impl Executable for Set {
    fn exec(self, store: &mut Store) -> Reply {
        match self.expiration {
            Some(ttl) => {
                let ttl = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
                let expires_at = now_millis().saturating_add(ttl);
                store.set_with_expiration(self.key, self.value, expires_at);
            }
            None => store.set(self.key, self.value),
        }

        Reply::ok()
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let value = parser.next_string()?;

        let mut expiration = None;
        while let Some(option) = parser.next_optional() {
            if expiration.is_some() {
                return Err(CommandError::Syntax);
            }

            let millis_per_unit: u64 = if option.eq_ignore_ascii_case("EX") {
                1000
            } else if option.eq_ignore_ascii_case("PX") {
                1
            } else {
                return Err(CommandError::Syntax);
            };

            let amount = parser.next_integer()?;
            let command = parser.kind().name();
            let invalid = || CommandError::InvalidExpireTime { command };

            let millis = u64::try_from(amount)
                .ok()
                .filter(|&amount| amount > 0)
                .and_then(|amount| amount.checked_mul(millis_per_unit))
                .ok_or_else(invalid)?;

            // The absolute expiration has to stay representable for PTTL.
            now_millis()
                .checked_add(millis)
                .and_then(|expires_at| i64::try_from(expires_at).ok())
                .ok_or_else(invalid)?;

            expiration = Some(Duration::from_millis(millis));
        }

        Ok(Self {
            key,
            value,
            expiration,
        })
    }
}
