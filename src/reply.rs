// https://redis.io/docs/reference/protocol-spec/#resp-protocol-description

use std::fmt;

static CRLF: &[u8; 2] = b"\r\n";

/// The result of executing a command, serialized as RESP2 before it is written back to the
/// client.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Simple(String),
    Bulk(String),
    Integer(i64),
    /// The "not found" marker, sent as a null bulk string.
    Nil,
    Error(String),
    Array(Vec<Reply>),
}

impl Reply {
    pub fn ok() -> Reply {
        Reply::Simple("OK".to_string())
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Reply::Simple(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(b'+');
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Reply::Error(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(b'-');
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Reply::Integer(i) => {
                let i = i.to_string();
                let mut bytes = Vec::with_capacity(1 + i.len() + CRLF.len());
                bytes.push(b':');
                bytes.extend_from_slice(i.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Reply::Bulk(s) => {
                let length_str = s.len().to_string();
                let mut result =
                    Vec::with_capacity(1 + length_str.len() + CRLF.len() + s.len() + CRLF.len());
                result.push(b'$');
                result.extend_from_slice(length_str.as_bytes());
                result.extend_from_slice(CRLF);
                result.extend_from_slice(s.as_bytes());
                result.extend_from_slice(CRLF);
                result
            }
            Reply::Nil => b"$-1\r\n".to_vec(),
            Reply::Array(arr) => {
                let length_str = arr.len().to_string();
                let mut bytes = Vec::with_capacity(1 + length_str.len() + CRLF.len());
                bytes.push(b'*');
                bytes.extend_from_slice(length_str.as_bytes());
                bytes.extend_from_slice(CRLF);
                for reply in arr {
                    bytes.extend(reply.serialize());
                }
                bytes
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "+{}", s),
            Reply::Error(s) => write!(f, "-{}", s),
            Reply::Integer(i) => write!(f, ":{}", i),
            Reply::Bulk(s) => write!(f, "${}", s),
            Reply::Nil => write!(f, "$-1"),
            Reply::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for reply in arr {
                    write!(f, " {}", reply)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_simple() {
        assert_eq!(Reply::ok().serialize(), b"+OK\r\n");
    }

    #[test]
    fn serialize_bulk() {
        assert_eq!(Reply::Bulk("bar".to_string()).serialize(), b"$3\r\nbar\r\n");
    }

    #[test]
    fn serialize_bulk_empty() {
        assert_eq!(Reply::Bulk(String::new()).serialize(), b"$0\r\n\r\n");
    }

    #[test]
    fn serialize_nil() {
        assert_eq!(Reply::Nil.serialize(), b"$-1\r\n");
    }

    #[test]
    fn serialize_error() {
        let reply = Reply::Error("ERR syntax error".to_string());

        assert_eq!(reply.serialize(), b"-ERR syntax error\r\n");
    }

    #[test]
    fn serialize_integer() {
        assert_eq!(Reply::Integer(-2).serialize(), b":-2\r\n");
        assert_eq!(Reply::Integer(1500).serialize(), b":1500\r\n");
    }

    #[test]
    fn serialize_array() {
        let reply = Reply::Array(vec![
            Reply::Bulk("GET".to_string()),
            Reply::Bulk("SET".to_string()),
        ]);

        assert_eq!(reply.serialize(), b"*2\r\n$3\r\nGET\r\n$3\r\nSET\r\n");
    }
}
