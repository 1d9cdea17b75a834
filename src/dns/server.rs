//! UDP server implementation

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{sleep, Builder};
use std::time::Duration;

use derive_more::{Display, Error, From};
use rand::Rng;

use crate::dns::buffer::{BytePacketBuffer, VectorPacketBuffer};
use crate::dns::context::ServerContext;
use crate::dns::protocol::DnsPacket;
use crate::dns::resolve::DnsResolver;

#[derive(Debug, Display, From, Error)]
pub enum ServerError {
    Io(std::io::Error),
}

type Result<T> = std::result::Result<T, ServerError>;

macro_rules! ignore_or_report {
    ( $x:expr, $message:expr ) => {
        match $x {
            Ok(_) => {}
            Err(e) => {
                log::warn!("{}: {}", $message, e);
                return;
            }
        };
    };
}

/// Common trait for servers
pub trait DnsServer {
    /// Start listening
    ///
    /// This method should _NOT_ block. Rather, servers are expected to spawn a new
    /// thread to handle requests and return immediately.
    fn run_server(self) -> Result<()>;
}

/// Build the response for a decoded request
///
/// The response always echoes the question and id. If resolution fails the
/// record sections are left empty, since something should still go back to
/// the client.
pub fn execute_query(context: &ServerContext, request: &DnsPacket) -> DnsPacket {
    let question = &request.question;
    let mut packet = DnsPacket::new(request.header.id, question.clone());

    let resolver = context.create_resolver();
    match resolver.resolve(&question.name, question.qtype) {
        Ok(result) => {
            packet.answers = result.answers;
            packet.authorities = result.authorities;
            packet.resources = result.resources;
        }
        Err(err) => {
            log::warn!(
                "Failed to resolve {} {}: {}",
                question.qtype,
                question.name,
                err
            );
        }
    }

    packet
}

/// The UDP server
///
/// Accepts queries through UDP. Packets are read on a single thread, after
/// which a new thread is spawned to service each request, so a slow response
/// never holds up the receive loop.
pub struct DnsUdpServer {
    context: Arc<ServerContext>,
    socket: Arc<UdpSocket>,
}

impl DnsUdpServer {
    /// Bind the listening socket described by the context
    pub fn bind(context: Arc<ServerContext>) -> Result<DnsUdpServer> {
        let socket = UdpSocket::bind((context.listen_host.as_str(), context.dns_port))?;

        Ok(DnsUdpServer {
            context,
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Resolve a single request and send the response
    fn process_request(
        socket: &UdpSocket,
        context: &ServerContext,
        src: SocketAddr,
        request: &DnsPacket,
    ) {
        let delay = if context.max_delay_secs > 0 {
            rand::thread_rng().gen_range(0, context.max_delay_secs)
        } else {
            0
        };

        log::info!(
            "rcv {}: {} {} {} (delay: {}s)",
            src.port(),
            request.header.id,
            request.question.qtype,
            request.question.name,
            delay
        );

        if delay > 0 {
            sleep(Duration::from_secs(delay));
        }

        let mut packet = execute_query(context, request);

        let mut res_buffer = VectorPacketBuffer::new();
        ignore_or_report!(
            packet.write(&mut res_buffer),
            "Failed to encode response packet"
        );

        ignore_or_report!(
            socket.send_to(&res_buffer.buffer, src),
            "Failed to send response packet"
        );
        context
            .statistics
            .response_count
            .fetch_add(1, Ordering::Release);

        log::info!(
            "snd {}: {} {} {}",
            src.port(),
            packet.header.id,
            packet.question.qtype,
            packet.question.name
        );
    }

    /// Spawn a thread dedicated to one request
    fn spawn_request_handler(&self, src: SocketAddr, request: DnsPacket) {
        let socket = self.socket.clone();
        let context = self.context.clone();

        let spawned = Builder::new()
            .name("DnsUdpServer-request".into())
            .spawn(move || {
                Self::process_request(&socket, &context, src, &request);
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn request thread for {}: {}", src, e);
        }
    }

    /// Decode one datagram, returning `None` if it is malformed
    fn read_request(&self, buffer: &mut BytePacketBuffer, src: SocketAddr) -> Option<DnsPacket> {
        match DnsPacket::from_buffer(buffer) {
            Ok(request) => Some(request),
            Err(e) => {
                self.context
                    .statistics
                    .malformed_count
                    .fetch_add(1, Ordering::Release);
                log::warn!("Dropping malformed query from {}: {}", src, e);
                None
            }
        }
    }

    fn incoming_loop(self) {
        loop {
            let mut req_buffer = BytePacketBuffer::new();
            let (len, src) = match self.socket.recv_from(&mut req_buffer.buf) {
                Ok(x) => x,
                Err(e) => {
                    log::warn!("Failed to read from UDP socket: {:?}", e);
                    continue;
                }
            };
            req_buffer.set_filled(len);

            self.context
                .statistics
                .udp_query_count
                .fetch_add(1, Ordering::Release);

            if let Some(request) = self.read_request(&mut req_buffer, src) {
                self.spawn_request_handler(src, request);
            }
        }
    }
}

impl DnsServer for DnsUdpServer {
    /// Launch the server
    ///
    /// This method takes ownership of the server, preventing the method from
    /// being called multiple times.
    fn run_server(self) -> Result<()> {
        log::info!("Listening on {}", self.local_addr()?);

        Builder::new()
            .name("DnsUdpServer-incoming".into())
            .spawn(move || self.incoming_loop())?;

        Ok(())
    }
}
