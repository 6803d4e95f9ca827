//! Single-threaded event loop.
//!
//! One `mio::Poll` multiplexes the listener and every client socket. The wait is bounded by the
//! nearest timer deadline, so periodic work such as the expiration sweep runs on time even when
//! no client is active. The server owns the store, the connection registry and the timer queue
//! outright, which is why none of them need locking.

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::codec::Decoder;
use tracing::{debug, info, info_span, warn};

use crate::codec::RequestCodec;
use crate::commands;
use crate::config::Config;
use crate::connection::{Connection, ReadOutcome};
use crate::reply::Reply;
use crate::store::Store;
use crate::time::now_millis;
use crate::timer::{TimerOutcome, TimerQueue};
use crate::Error;

const LISTENER: Token = Token(0);
const CONNECTION_TOKEN_START: usize = 1;
const MAX_EVENTS: usize = 1024;
/// Chunks read from one connection per readiness event before moving on to other work.
const MAX_READS_PER_EVENT: usize = 16;

/// Actions the timer queue can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    /// Active expiration of keys with an elapsed time to live.
    ExpireCron,
}

pub struct Server {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    // Connections that stopped reading at the per-event cap with data possibly left in the
    // socket. Readiness is edge triggered, so they get no new event for it.
    pending_reads: Vec<Token>,
    next_token: usize,
    store: Store,
    timers: TimerQueue<Timer>,
    config: Config,
}

/// Binds a server with the given configuration and runs it forever.
pub fn run(config: Config) -> Result<(), Error> {
    Server::bind(config)?.run()
}

impl Server {
    /// Binds the listener, registers it with the poller and schedules the expiration sweep.
    pub fn bind(config: Config) -> Result<Server, Error> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(config.addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        let mut timers = TimerQueue::new();
        timers.schedule(
            now_millis() + config.expire_cron_period.as_millis() as u64,
            Timer::ExpireCron,
        );

        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            poll,
            events: Events::with_capacity(MAX_EVENTS),
            listener,
            connections: HashMap::new(),
            pending_reads: Vec::new(),
            next_token: CONNECTION_TOKEN_START,
            store: Store::new(),
            timers,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            self.turn()?;
        }
    }

    /// Runs one iteration of the event loop: wait for readiness or the next timer deadline,
    /// serve every ready socket, then fire the timers that are due.
    pub fn turn(&mut self) -> Result<(), Error> {
        let timeout = if self.pending_reads.is_empty() {
            self.timers.timeout(now_millis())
        } else {
            Duration::ZERO
        };

        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            // A signal interrupted the wait, treat it as a wakeup with no events.
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }

        let mut ready: Vec<(Token, bool, bool)> = self
            .events
            .iter()
            .map(|event| {
                let readable = event.is_readable() || event.is_read_closed() || event.is_error();
                (event.token(), readable, event.is_writable())
            })
            .collect();

        for token in std::mem::take(&mut self.pending_reads) {
            match ready.iter_mut().find(|(ready_token, _, _)| *ready_token == token) {
                Some((_, readable, _)) => *readable = true,
                None => ready.push((token, true, false)),
            }
        }

        for (token, readable, writable) in ready {
            if token == LISTENER {
                self.accept_connections();
            } else {
                self.handle_connection_event(token, readable, writable);
            }
        }

        self.run_timers();

        Ok(())
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut socket, peer)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    if let Err(err) =
                        self.poll
                            .registry()
                            .register(&mut socket, token, Interest::READABLE)
                    {
                        warn!("Failed to register connection from {}: {}", peer, err);
                        continue;
                    }

                    let connection = Connection::new(socket, peer);
                    info!(id = %connection.id, %peer, "Accepted connection");
                    self.connections.insert(token, connection);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("Failed to accept connection: {}", err);
                    return;
                }
            }
        }
    }

    fn handle_connection_event(&mut self, token: Token, readable: bool, writable: bool) {
        // Events for a connection closed earlier in this same turn are stale.
        let Some(mut connection) = self.connections.remove(&token) else {
            return;
        };

        let span = info_span!("connection", id = %connection.id, peer = %connection.peer);
        let _enter = span.enter();

        if writable {
            if let Err(err) = connection.flush() {
                debug!("Failed to write to client: {}", err);
                connection.close();
            }
        }

        if readable && connection.is_open() && !self.read_connection(&mut connection) {
            self.pending_reads.push(token);
        }

        if connection.is_finished() {
            self.close_connection(connection);
            return;
        }

        if let Err(err) = self.refresh_interest(token, &mut connection) {
            warn!("Failed to update connection interest: {}", err);
            self.close_connection(connection);
            return;
        }

        self.connections.insert(token, connection);
    }

    /// Reads from the socket until it would block, the peer is gone, or the connection stopped
    /// accepting requests. Returns `false` when reading stopped at the per-event cap instead,
    /// with data possibly still waiting in the socket.
    fn read_connection(&mut self, connection: &mut Connection) -> bool {
        for _ in 0..MAX_READS_PER_EVENT {
            match connection.read_chunk(self.config.read_chunk_size) {
                Ok(ReadOutcome::Data(read)) => {
                    debug!(read, buffered = connection.buffer.len(), "Read from client");
                    self.process_requests(connection);
                    if !connection.is_open() {
                        return true;
                    }
                }
                // Spurious wakeup, or everything available was consumed.
                Ok(ReadOutcome::WouldBlock) => return true,
                Ok(ReadOutcome::Eof) => {
                    debug!("Client closed the connection");
                    connection.close();
                    return true;
                }
                Err(err) => {
                    debug!("Failed to read from client: {}", err);
                    connection.close();
                    return true;
                }
            }
        }

        false
    }

    /// Executes every complete request in the connection's buffer, in order. A partial request
    /// stays buffered until more bytes arrive. A protocol error is answered and then ends the
    /// connection, since the rest of its stream can no longer be framed.
    fn process_requests(&mut self, connection: &mut Connection) {
        loop {
            let reply = match RequestCodec.decode(&mut connection.buffer) {
                Ok(Some(request)) => {
                    debug!(?request, "Received request");
                    commands::dispatch(request, &mut self.store)
                }
                Ok(None) => return,
                Err(err) => {
                    warn!("Closing connection after protocol error: {}", err);
                    connection.close_after_flush();
                    Reply::Error(format!("ERR {err}"))
                }
            };

            debug!(%reply, "Sending reply");
            if let Err(err) = connection.write_reply(&reply) {
                debug!("Failed to write to client: {}", err);
                connection.close();
            }

            if !connection.is_open() {
                return;
            }
        }
    }

    fn refresh_interest(&self, token: Token, connection: &mut Connection) -> io::Result<()> {
        let Some(interest) = connection.desired_interest() else {
            return Ok(());
        };
        if interest == connection.interest() {
            return Ok(());
        }

        self.poll
            .registry()
            .reregister(connection.socket_mut(), token, interest)?;
        connection.set_interest(interest);
        Ok(())
    }

    fn close_connection(&mut self, mut connection: Connection) {
        if let Err(err) = self.poll.registry().deregister(connection.socket_mut()) {
            debug!("Failed to deregister connection: {}", err);
        }
        info!(state = ?connection.state(), "Connection closed");
    }

    fn run_timers(&mut self) {
        let now = now_millis();
        let store = &mut self.store;
        let config = &self.config;

        self.timers.run_due(now, |timer| match timer {
            Timer::ExpireCron => {
                let removed = store.remove_expired_keys(now, config.expire_cron_max_keys);
                if removed > 0 {
                    debug!(
                        removed,
                        volatile = store.volatile_size(),
                        "Removed expired keys"
                    );
                }
                TimerOutcome::Reschedule(config.expire_cron_period)
            }
        });
    }
}
