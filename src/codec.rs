use bytes::{Buf, BytesMut};
use std::convert::TryInto;
use std::io::Cursor;
use tokio_util::codec::Decoder;

use crate::frame::{Error, Frame};

/// Turns a connection's read buffer into requests.
///
/// Every successfully decoded request is removed from the front of the buffer, byte exact, so
/// the buffer always starts at the first unconsumed byte. When the buffer only holds part of a
/// request it is left untouched and `Ok(None)` is returned.
#[derive(Debug, Default)]
pub struct RequestCodec;

impl Decoder for RequestCodec {
    type Item = Vec<String>;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let mut cursor = Cursor::new(&src[..]);
            let frame = match Frame::parse_request(&mut cursor) {
                Ok(frame) => frame,
                Err(Error::Incomplete) => return Ok(None), // Not enough data to parse a frame.
                Err(err) => return Err(err),
            };

            let position: usize = cursor
                .position()
                .try_into()
                .map_err(|_| Error::InvalidLength("request"))?;

            // Remove the parsed frame from the buffer.
            src.advance(position);

            match frame {
                Some(frame) => return frame.into_request().map(Some),
                // Blank inline line, keep going with whatever follows it.
                None => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn decode_all(src: &mut BytesMut) -> Vec<Vec<String>> {
        let mut codec = RequestCodec;
        let mut requests = Vec::new();
        while let Some(request) = codec.decode(src).unwrap() {
            requests.push(request);
        }
        requests
    }

    fn request(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn decode_single_request() {
        let mut src = BytesMut::from(&b"*3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$7\r\nmyvalue\r\n"[..]);

        let requests = decode_all(&mut src);

        assert_eq!(requests, vec![request(&["SET", "mykey", "myvalue"])]);
        assert!(src.is_empty());
    }

    #[test]
    fn decode_multiple_requests_from_one_buffer() {
        let mut src = BytesMut::from(
            &b"*2\r\n$3\r\nGET\r\n$1\r\na\r\n*3\r\n$3\r\nSET\r\n$1\r\nb\r\n$1\r\nc\r\nTTL b\r\n"[..],
        );

        let requests = decode_all(&mut src);

        assert_eq!(
            requests,
            vec![
                request(&["GET", "a"]),
                request(&["SET", "b", "c"]),
                request(&["TTL", "b"]),
            ]
        );
        assert!(src.is_empty());
    }

    #[test]
    fn decode_keeps_trailing_partial_request() {
        let mut src = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$1\r\na\r\n*2\r\n$3\r\nGET\r\n$1\r\n"[..]);

        let requests = decode_all(&mut src);

        assert_eq!(requests, vec![request(&["GET", "a"])]);
        assert_eq!(&src[..], &b"*2\r\n$3\r\nGET\r\n$1\r\n"[..]);
    }

    #[test]
    fn decode_incomplete_leaves_buffer_unchanged() {
        let data = b"*2\r\n$3\r\nGET\r\n$1\r\n";
        let mut src = BytesMut::from(&data[..]);

        let result = RequestCodec.decode(&mut src);

        assert!(matches!(result, Ok(None)));
        assert_eq!(&src[..], &data[..]);
    }

    #[test]
    fn decode_waits_on_invalid_bulk_length() {
        for data in [&b"*1\r\n$x\r\n"[..], &b"*2\r\n$3\r\nGET\r\n$0\r\n\r\n"[..]] {
            let mut src = BytesMut::from(data);

            let result = RequestCodec.decode(&mut src);

            assert!(matches!(result, Ok(None)));
            assert_eq!(&src[..], data);
        }
    }

    #[test]
    fn decode_empty_array() {
        let mut src = BytesMut::from(&b"*0\r\n"[..]);

        let requests = decode_all(&mut src);

        assert_eq!(requests, vec![Vec::<String>::new()]);
    }

    #[test]
    fn decode_skips_blank_inline_lines() {
        let mut src = BytesMut::from(&b"\r\n  \r\nGET a\r\n"[..]);

        let requests = decode_all(&mut src);

        assert_eq!(requests, vec![request(&["GET", "a"])]);
    }

    #[test]
    fn decode_length_mismatch_is_an_error() {
        let mut src = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$3\r\nabcd\r\n"[..]);

        let result = RequestCodec.decode(&mut src);

        assert!(matches!(
            result,
            Err(Error::BulkLengthMismatch { declared: 3 })
        ));
    }

    #[test]
    fn decode_invalid_data_type_is_an_error() {
        let mut src = BytesMut::from(&b"*1\r\n+OK\r\n"[..]);

        let result = RequestCodec.decode(&mut src);

        assert!(matches!(result, Err(Error::InvalidDataType('+'))));
    }

    #[test]
    fn decode_nested_array_is_an_error() {
        let mut src = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n*1\r\n$1\r\na\r\n"[..]);

        let result = RequestCodec.decode(&mut src);

        assert!(matches!(result, Err(Error::UnexpectedFrame { .. })));
    }

    #[test]
    fn decode_is_independent_of_chunking() {
        let stream: &[u8] = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$9\r\nba\r\nr baz\r\n\
            GET foo\r\n\
            \r\n\
            *2\r\n$4\r\nPTTL\r\n$3\r\nfoo\r\n\
            *0\r\n\
            *1\r\n$7\r\nCOMMAND\r\n";

        let mut whole = BytesMut::from(stream);
        let expected = decode_all(&mut whole);
        assert_eq!(expected.len(), 5);
        assert!(whole.is_empty());

        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let mut src = BytesMut::new();
            let mut actual = Vec::new();
            let mut offset = 0;

            while offset < stream.len() {
                let chunk = rng.gen_range(1..=8).min(stream.len() - offset);
                src.extend_from_slice(&stream[offset..offset + chunk]);
                offset += chunk;
                actual.extend(decode_all(&mut src));
            }

            assert_eq!(actual, expected);
            assert!(src.is_empty());
        }
    }
}
