use bytes::{Buf, BytesMut};
use mio::net::TcpStream;
use mio::Interest;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::reply::Reply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Open,
    /// No more requests are read. The connection closes once pending replies are flushed.
    Closing,
    Closed,
}

/// What a single non-blocking read produced.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes were appended to the read buffer.
    Data(usize),
    /// The socket has nothing to read right now.
    WouldBlock,
    /// The peer closed its end of the stream.
    Eof,
}

#[derive(Debug)]
pub struct Connection {
    pub id: Uuid,
    pub peer: SocketAddr,
    socket: TcpStream,
    // Data is read from the socket into the read buffer. When a request is parsed, the
    // corresponding data is removed from the buffer.
    pub buffer: BytesMut,
    // Serialized replies the socket has not accepted yet.
    write_buffer: BytesMut,
    state: State,
    interest: Interest,
}

impl Connection {
    pub fn new(socket: TcpStream, peer: SocketAddr) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            peer,
            socket,
            // Allocate the buffer with 4kb of capacity.
            buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::new(),
            state: State::Open,
            interest: Interest::READABLE,
        }
    }

    pub fn socket_mut(&mut self) -> &mut TcpStream {
        &mut self.socket
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    pub fn close_after_flush(&mut self) {
        if self.state == State::Open {
            self.state = State::Closing;
        }
    }

    pub fn close(&mut self) {
        self.state = State::Closed;
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.write_buffer.is_empty()
    }

    /// Whether the connection is done and should be dropped from the registry.
    pub fn is_finished(&self) -> bool {
        match self.state {
            State::Open => false,
            State::Closing => self.write_buffer.is_empty(),
            State::Closed => true,
        }
    }

    /// Performs one non-blocking read of at most `chunk_size` bytes into the read buffer.
    pub fn read_chunk(&mut self, chunk_size: usize) -> io::Result<ReadOutcome> {
        let start = self.buffer.len();
        self.buffer.resize(start + chunk_size, 0);

        let result = loop {
            match self.socket.read(&mut self.buffer[start..]) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                result => break result,
            }
        };

        let read = *result.as_ref().unwrap_or(&0);
        self.buffer.truncate(start + read);

        match result {
            Ok(0) => Ok(ReadOutcome::Eof),
            Ok(read) => Ok(ReadOutcome::Data(read)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            Err(err) => Err(err),
        }
    }

    /// Queues a reply and tries to send it right away.
    pub fn write_reply(&mut self, reply: &Reply) -> io::Result<()> {
        self.write_buffer.extend_from_slice(&reply.serialize());
        self.flush()
    }

    /// Writes as much of the pending replies as the socket accepts without blocking.
    pub fn flush(&mut self) -> io::Result<()> {
        while !self.write_buffer.is_empty() {
            match self.socket.write(&self.write_buffer) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(written) => self.write_buffer.advance(written),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// The readiness this connection needs next, or `None` when it needs nothing.
    pub fn desired_interest(&self) -> Option<Interest> {
        match (self.state, self.has_pending_writes()) {
            (State::Open, false) => Some(Interest::READABLE),
            (State::Open, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (State::Closing, true) => Some(Interest::WRITABLE),
            (State::Closing, false) | (State::Closed, _) => None,
        }
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    pub fn set_interest(&mut self, interest: Interest) {
        self.interest = interest;
    }
}
