// https://redis.io/docs/reference/protocol-spec

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use std::str::Utf8Error;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("Protocol error: invalid frame data type '{0}'")]
    InvalidDataType(char),
    #[error("Protocol error: invalid {0} length")]
    InvalidLength(&'static str),
    #[error("Protocol error: bulk payload does not match declared length {declared}")]
    BulkLengthMismatch { declared: usize },
    #[error("Protocol error: expected {expected}, got {actual}")]
    UnexpectedFrame {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Protocol error: invalid UTF-8 string")]
    InvalidUtf8,
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// A request-side RESP value. Clients only ever send bulk strings, possibly wrapped in
/// (nested) arrays.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Bulk(Bytes),
    Array(Vec<Frame>),
}

impl Frame {
    /// Parses one top-level request starting at the cursor position.
    ///
    /// Requests starting with `*` are decoded as RESP arrays. Anything else is handled as an
    /// inline command: a single line of whitespace separated tokens. A blank inline line is
    /// consumed but yields `Ok(None)`.
    ///
    /// On success the cursor sits right after the last consumed byte, so its position is the
    /// number of bytes the request occupied.
    pub fn parse_request(src: &mut Cursor<&[u8]>) -> Result<Option<Self>, Error> {
        let start = src.position() as usize;
        let first_byte = *src.get_ref().get(start).ok_or(Error::Incomplete)?;

        if first_byte == u8::from(DataType::Array) {
            return Self::parse(src).map(Some);
        }

        Self::parse_inline(src)
    }

    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = get_bulk_length(src)?;

                let start = src.position() as usize;
                let end = start
                    .checked_add(length)
                    .ok_or(Error::InvalidLength("bulk"))?;
                let data = src.get_ref();

                if data.len().saturating_sub(end) < CRLF.len() {
                    return Err(Error::Incomplete);
                }

                // The payload is binary safe, so the declared length alone decides where it
                // ends. Whatever follows it must be the terminator.
                if &data[end..end + CRLF.len()] != CRLF {
                    return Err(Error::BulkLengthMismatch { declared: length });
                }

                let payload = Bytes::copy_from_slice(&data[start..end]);
                src.set_position((end + CRLF.len()) as u64);

                Ok(Frame::Bulk(payload))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                let length = get_length(src, "multibulk")?;

                // Every element takes at least one byte, which bounds the allocation by what
                // has actually been received.
                let mut frames = Vec::with_capacity(length.min(src.remaining()));
                for _ in 0..length {
                    let frame = Self::parse(src)?;
                    frames.push(frame);
                }

                Ok(Frame::Array(frames))
            }
        }
    }

    // <token> <token> ...\r\n
    fn parse_inline(src: &mut Cursor<&[u8]>) -> Result<Option<Self>, Error> {
        let start = src.position() as usize;
        let data = &src.get_ref()[start..];

        let line_end = data
            .iter()
            .position(|&byte| byte == b'\n')
            .ok_or(Error::Incomplete)?;

        let line = &data[..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = std::str::from_utf8(line)?;

        src.set_position((start + line_end + 1) as u64);

        let tokens: Vec<Frame> = line
            .split_whitespace()
            .map(|token| Frame::Bulk(Bytes::copy_from_slice(token.as_bytes())))
            .collect();

        if tokens.is_empty() {
            return Ok(None);
        }

        Ok(Some(Frame::Array(tokens)))
    }

    /// Converts a top-level frame into the ordered list of request arguments. The first
    /// element, when present, is the command name.
    pub fn into_request(self) -> Result<Vec<String>, Error> {
        // Clients send commands to the server as RESP arrays of bulk strings.
        let frames = match self {
            Frame::Array(frames) => frames,
            Frame::Bulk(_) => {
                return Err(Error::UnexpectedFrame {
                    expected: "array",
                    actual: "bulk string",
                })
            }
        };

        frames
            .into_iter()
            .map(|frame| match frame {
                Frame::Bulk(bytes) => Ok(String::from_utf8(bytes.to_vec())?),
                Frame::Array(_) => Err(Error::UnexpectedFrame {
                    expected: "bulk string",
                    actual: "array",
                }),
            })
            .collect()
    }
}

fn get_frame_bytes<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let end = src.get_ref().len();

    let frame_end_position = src.get_ref()[start..end]
        .windows(2)
        .position(|window| window == CRLF)
        .ok_or(Error::Incomplete)
        .map(|index| start + index)?;

    src.set_position((frame_end_position + CRLF.len()) as u64);

    Ok(&src.get_ref()[start..frame_end_position])
}

/// Bulk lengths must be positive. A length line that is not a positive number is treated as
/// a request that has not fully arrived yet.
fn get_bulk_length(src: &mut Cursor<&[u8]>) -> Result<usize, Error> {
    let length = get_frame_bytes(src)?;
    std::str::from_utf8(length)
        .ok()
        .and_then(|length| length.parse::<usize>().ok())
        .filter(|&length| length > 0)
        .ok_or(Error::Incomplete)
}

fn get_length(src: &mut Cursor<&[u8]>, kind: &'static str) -> Result<usize, Error> {
    let length = get_frame_bytes(src)?;
    std::str::from_utf8(length)
        .ok()
        .and_then(|length| length.parse::<usize>().ok())
        .ok_or(Error::InvalidLength(kind))
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    BulkString, // '$'
    Array,      // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(char::from(byte))),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        Error::InvalidUtf8
    }
}

impl From<Utf8Error> for Error {
    fn from(_src: Utf8Error) -> Error {
        Error::InvalidUtf8
    }
}
