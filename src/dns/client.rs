//! client for sending a single query and waiting for its response

use std::fmt::Write;
use std::io::ErrorKind;
use std::net::{ToSocketAddrs, UdpSocket};
use std::time::Duration;

use derive_more::{Display, Error, From};
use rand::Rng;
use serde_derive::Serialize;

use crate::dns::buffer::{BytePacketBuffer, VectorPacketBuffer};
use crate::dns::protocol::{
    DnsPacket, DnsQuestion, DnsRecord, QueryType, RecordSection, ResourceRecord,
};

#[derive(Debug, Display, From, Error)]
pub enum ClientError {
    Protocol(crate::dns::protocol::ProtocolError),
    Io(std::io::Error),
    #[display(fmt = "timed out")]
    #[from(ignore)]
    TimeOut,
}

type Result<T> = std::result::Result<T, ClientError>;

/// Transaction ids are drawn from `MIN_QUERY_ID..MAX_QUERY_ID`
pub const MIN_QUERY_ID: u16 = 49152;
pub const MAX_QUERY_ID: u16 = 65535;

/// Width of each column when printing records
const COLUMN_WIDTH: usize = 35;

pub fn random_query_id() -> u16 {
    rand::thread_rng().gen_range(MIN_QUERY_ID, MAX_QUERY_ID)
}

/// The UDP client
///
/// Each query is sent once and the client blocks until either a datagram
/// arrives or the timeout expires. There are no retries.
pub struct DnsNetworkClient {
    socket: UdpSocket,
}

impl DnsNetworkClient {
    pub fn new(timeout: Duration) -> Result<DnsNetworkClient> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;

        // a zero read timeout is rejected by the OS, the shortest wait
        // possible is the closest meaning
        let timeout = timeout.max(Duration::from_millis(1));
        socket.set_read_timeout(Some(timeout))?;

        if let Ok(local_addr) = socket.local_addr() {
            log::debug!("Client bound to port {}", local_addr.port());
        }

        Ok(DnsNetworkClient { socket })
    }

    /// Send a query with a freshly drawn transaction id
    pub fn send_query<A: ToSocketAddrs>(
        &self,
        qname: &str,
        qtype: QueryType,
        server: A,
    ) -> Result<DnsPacket> {
        self.send_query_with_id(random_query_id(), qname, qtype, server)
    }

    pub fn send_query_with_id<A: ToSocketAddrs>(
        &self,
        id: u16,
        qname: &str,
        qtype: QueryType,
        server: A,
    ) -> Result<DnsPacket> {
        let mut packet = DnsPacket::new(id, DnsQuestion::new(qname.to_string(), qtype));

        let mut req_buffer = VectorPacketBuffer::new();
        packet.write(&mut req_buffer)?;
        self.socket.send_to(&req_buffer.buffer, server)?;

        let mut res_buffer = BytePacketBuffer::new();
        let len = match self.socket.recv_from(&mut res_buffer.buf) {
            Ok((len, _)) => len,
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                return Err(ClientError::TimeOut);
            }
            Err(e) => return Err(ClientError::Io(e)),
        };
        res_buffer.set_filled(len);

        let response = DnsPacket::from_buffer(&mut res_buffer)?;
        if response.header.id != id {
            log::warn!(
                "Response id {} does not match query id {}",
                response.header.id,
                id
            );
        }

        Ok(response)
    }
}

fn write_records(out: &mut String, title: &str, records: &[DnsRecord]) {
    let _ = writeln!(out, "{}", title);
    for rec in records {
        let _ = writeln!(
            out,
            "{:<width$} {:<width$} {}",
            rec.get_domain(),
            rec.get_querytype().to_string(),
            rec.get_value(),
            width = COLUMN_WIDTH
        );
    }
    let _ = writeln!(out);
}

/// Render a response as the plain text report printed by the client
pub fn render_response(packet: &DnsPacket) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "QID: {}", packet.header.id);
    let _ = writeln!(out);
    let _ = writeln!(out, "QUESTION SECTION:");
    let _ = writeln!(out, "{} {}", packet.question.name, packet.question.qtype);
    let _ = writeln!(out);

    let sections = [
        ("ANSWER:", RecordSection::Answer),
        ("AUTHORITY:", RecordSection::Authority),
        ("ADDITIONAL SECTION:", RecordSection::Additional),
    ];
    for (title, section) in sections.iter() {
        write_records(&mut out, title, section_records(packet, *section));
    }

    out
}

#[derive(Serialize)]
struct ResponseReport<'a> {
    id: u16,
    name: &'a str,
    qtype: QueryType,
    records: Vec<ResourceRecord>,
}

/// Render a response as JSON, one entry per record in wire order
pub fn response_to_json(packet: &DnsPacket) -> serde_json::Result<String> {
    let report = ResponseReport {
        id: packet.header.id,
        name: &packet.question.name,
        qtype: packet.question.qtype,
        records: packet.resource_records(),
    };

    serde_json::to_string_pretty(&report)
}

/// Records of a response belonging to `section`
pub fn section_records(packet: &DnsPacket, section: RecordSection) -> &[DnsRecord] {
    match section {
        RecordSection::Answer => &packet.answers,
        RecordSection::Authority => &packet.authorities,
        RecordSection::Additional => &packet.resources,
    }
}
