//! implements the wire protocol in a transport agnostic fashion
//!
//! A message is a 4 byte header followed by one question and any number of
//! resource records. Every integer is a little endian u16. Records carry
//! their payload as the text `name TYPE value`, tagged with the section they
//! belong to; `DnsRecord` is the structured form of that text.

use std::fmt;
use std::str::FromStr;

use derive_more::{Display, Error, From};
use serde_derive::{Deserialize, Serialize};

use crate::dns::buffer::{BufferError, PacketBuffer};

#[derive(Debug, Display, From, Error)]
pub enum ProtocolError {
    Buffer(BufferError),
    #[display(fmt = "unknown query type code {}", _0)]
    #[from(ignore)]
    UnknownQueryType(#[error(not(source))] u16),
    #[display(fmt = "unknown section code {}", _0)]
    #[from(ignore)]
    UnknownSection(#[error(not(source))] u16),
    #[display(fmt = "unknown record type {}", _0)]
    #[from(ignore)]
    UnknownTypeName(#[error(not(source))] String),
    #[display(fmt = "malformed record text: {:?}", _0)]
    #[from(ignore)]
    MalformedRecord(#[error(not(source))] String),
    #[display(fmt = "declared payload exceeds the datagram")]
    #[from(ignore)]
    Truncated,
    #[display(fmt = "field does not fit a 16 bit length")]
    #[from(ignore)]
    TooLong,
    #[display(fmt = "empty query name")]
    #[from(ignore)]
    EmptyName,
}

type Result<T> = std::result::Result<T, ProtocolError>;

/// Size of the fixed header
pub const HEADER_LEN: usize = 4;

/// `QueryType` represents the requested record family of a query
///
/// Only three families exist. Converting an unmapped code with `from_num`
/// is an error rather than an `Unknown` placeholder.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy, Serialize, Deserialize)]
pub enum QueryType {
    A,     // 1
    Ns,    // 2
    Cname, // 5
}

impl QueryType {
    pub fn to_num(&self) -> u16 {
        match *self {
            QueryType::A => 1,
            QueryType::Ns => 2,
            QueryType::Cname => 5,
        }
    }

    pub fn from_num(num: u16) -> Result<QueryType> {
        match num {
            1 => Ok(QueryType::A),
            2 => Ok(QueryType::Ns),
            5 => Ok(QueryType::Cname),
            _ => Err(ProtocolError::UnknownQueryType(num)),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            QueryType::A => "A",
            QueryType::Ns => "NS",
            QueryType::Cname => "CNAME",
        };

        f.write_str(name)
    }
}

impl FromStr for QueryType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<QueryType> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(QueryType::A),
            "NS" => Ok(QueryType::Ns),
            "CNAME" => Ok(QueryType::Cname),
            _ => Err(ProtocolError::UnknownTypeName(s.to_string())),
        }
    }
}

/// The section of a response a record belongs to
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy, Serialize, Deserialize)]
pub enum RecordSection {
    Answer,     // 1
    Authority,  // 2
    Additional, // 3
}

impl RecordSection {
    pub fn to_num(&self) -> u16 {
        match *self {
            RecordSection::Answer => 1,
            RecordSection::Authority => 2,
            RecordSection::Additional => 3,
        }
    }

    pub fn from_num(num: u16) -> Result<RecordSection> {
        match num {
            1 => Ok(RecordSection::Answer),
            2 => Ok(RecordSection::Authority),
            3 => Ok(RecordSection::Additional),
            _ => Err(ProtocolError::UnknownSection(num)),
        }
    }
}

impl fmt::Display for RecordSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            RecordSection::Answer => "Answer",
            RecordSection::Authority => "Authority",
            RecordSection::Additional => "Additional",
        };

        f.write_str(name)
    }
}

/// `DnsRecord` is the structured representation of a record
///
/// It is what the record store holds and what the resolver emits. On the
/// wire it travels as the text produced by its `Display` impl.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DnsRecord {
    A { domain: String, addr: String },    // 1
    Ns { domain: String, host: String },   // 2
    Cname { domain: String, host: String }, // 5
}

impl DnsRecord {
    pub fn new(domain: &str, qtype: QueryType, value: &str) -> DnsRecord {
        let domain = domain.to_string();
        let value = value.to_string();
        match qtype {
            QueryType::A => DnsRecord::A {
                domain,
                addr: value,
            },
            QueryType::Ns => DnsRecord::Ns {
                domain,
                host: value,
            },
            QueryType::Cname => DnsRecord::Cname {
                domain,
                host: value,
            },
        }
    }

    pub fn get_querytype(&self) -> QueryType {
        match *self {
            DnsRecord::A { .. } => QueryType::A,
            DnsRecord::Ns { .. } => QueryType::Ns,
            DnsRecord::Cname { .. } => QueryType::Cname,
        }
    }

    pub fn get_domain(&self) -> &str {
        match *self {
            DnsRecord::A { ref domain, .. }
            | DnsRecord::Ns { ref domain, .. }
            | DnsRecord::Cname { ref domain, .. } => domain,
        }
    }

    /// The address, name server or canonical name, depending on the family
    pub fn get_value(&self) -> &str {
        match *self {
            DnsRecord::A { ref addr, .. } => addr,
            DnsRecord::Ns { ref host, .. } | DnsRecord::Cname { ref host, .. } => host,
        }
    }
}

impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.get_domain(),
            self.get_querytype(),
            self.get_value()
        )
    }
}

impl FromStr for DnsRecord {
    type Err = ProtocolError;

    fn from_str(text: &str) -> Result<DnsRecord> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ProtocolError::MalformedRecord(text.to_string()));
        }

        let qtype = parts[1].parse::<QueryType>()?;

        Ok(DnsRecord::new(parts[0], qtype, parts[2]))
    }
}

/// Representation of the message header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DnsHeader {
    /// Byte length of everything following the header
    pub payload_size: u16,
    pub id: u16,
}

impl DnsHeader {
    pub fn new(id: u16) -> DnsHeader {
        DnsHeader {
            payload_size: 0,
            id,
        }
    }

    pub fn binary_len(&self) -> usize {
        HEADER_LEN
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_u16(self.payload_size)?;
        buffer.write_u16(self.id)?;

        Ok(())
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        self.payload_size = buffer.read_u16()?;
        self.id = buffer.read_u16()?;

        Ok(())
    }
}

impl fmt::Display for DnsHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DnsHeader:")?;
        writeln!(f, "\tpayload_size: {0}", self.payload_size)?;
        writeln!(f, "\tid: {0}", self.id)?;

        Ok(())
    }
}

fn length_prefix(text: &str) -> Result<u16> {
    if text.len() > u16::MAX as usize {
        return Err(ProtocolError::TooLong);
    }

    Ok(text.len() as u16)
}

/// Representation of a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: QueryType,
}

impl DnsQuestion {
    pub fn new(name: String, qtype: QueryType) -> DnsQuestion {
        DnsQuestion { name, qtype }
    }

    pub fn binary_len(&self) -> usize {
        4 + self.name.len()
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        if self.name.is_empty() {
            return Err(ProtocolError::EmptyName);
        }

        buffer.write_u16(length_prefix(&self.name)?)?;
        buffer.write_u16(self.qtype.to_num())?;
        buffer.write_text(&self.name)?;

        Ok(())
    }

    pub fn read<T: PacketBuffer>(buffer: &mut T) -> Result<DnsQuestion> {
        let name_len = buffer.read_u16()? as usize;
        let qtype = QueryType::from_num(buffer.read_u16()?)?;
        let name = buffer.read_text(name_len)?;
        if name.is_empty() {
            return Err(ProtocolError::EmptyName);
        }

        Ok(DnsQuestion { name, qtype })
    }
}

impl fmt::Display for DnsQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DnsQuestion:")?;
        writeln!(f, "\tname: {0}", self.name)?;
        writeln!(f, "\trecord type: {}", self.qtype)?;

        Ok(())
    }
}

/// A record as it travels on the wire: section tag plus `name TYPE value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub section: RecordSection,
    pub text: String,
}

impl ResourceRecord {
    pub fn new(section: RecordSection, text: String) -> ResourceRecord {
        ResourceRecord { section, text }
    }

    pub fn from_record(section: RecordSection, record: &DnsRecord) -> ResourceRecord {
        ResourceRecord {
            section,
            text: record.to_string(),
        }
    }

    /// Parse the text back into its structured form
    pub fn record(&self) -> Result<DnsRecord> {
        self.text.parse()
    }

    /// Total size on the wire
    pub fn binary_len(&self) -> usize {
        4 + self.text.len()
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<usize> {
        let start_pos = buffer.pos();

        buffer.write_u16(length_prefix(&self.text)?)?;
        buffer.write_u16(self.section.to_num())?;
        buffer.write_text(&self.text)?;

        Ok(buffer.pos() - start_pos)
    }

    pub fn read<T: PacketBuffer>(buffer: &mut T) -> Result<ResourceRecord> {
        let text_len = buffer.read_u16()? as usize;
        let section = RecordSection::from_num(buffer.read_u16()?)?;
        let text = buffer.read_text(text_len)?;

        Ok(ResourceRecord { section, text })
    }

    /// Read consecutive records from the cursor up to `end`
    ///
    /// Each record occupies `4 + text_length` bytes, so the cursor always
    /// advances and the loop ends once `end` is reached. A record running
    /// past `end` is an error.
    pub fn read_all<T: PacketBuffer>(buffer: &mut T, end: usize) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        while buffer.pos() < end {
            let rec = ResourceRecord::read(buffer)?;
            if buffer.pos() > end {
                return Err(ProtocolError::Truncated);
            }
            records.push(rec);
        }

        Ok(records)
    }
}

/// Representation of a complete message
///
/// Queries carry only the question. Responses echo the question followed by
/// answers, authorities and additional resources, in that order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsPacket {
    pub header: DnsHeader,
    pub question: DnsQuestion,
    pub answers: Vec<DnsRecord>,
    pub authorities: Vec<DnsRecord>,
    pub resources: Vec<DnsRecord>,
}

impl DnsPacket {
    pub fn new(id: u16, question: DnsQuestion) -> DnsPacket {
        DnsPacket {
            header: DnsHeader::new(id),
            question,
            answers: Vec::new(),
            authorities: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn from_buffer<T: PacketBuffer>(buffer: &mut T) -> Result<DnsPacket> {
        let mut header = DnsHeader::default();
        header.read(buffer)?;

        let payload_size = header.payload_size as usize;
        if payload_size > buffer.remaining() {
            return Err(ProtocolError::Truncated);
        }
        let end = buffer.pos() + payload_size;

        let question = DnsQuestion::read(buffer)?;
        if buffer.pos() > end {
            return Err(ProtocolError::Truncated);
        }

        let mut result = DnsPacket::new(header.id, question);
        result.header = header;

        for rec in ResourceRecord::read_all(buffer, end)? {
            let record = rec.record()?;
            match rec.section {
                RecordSection::Answer => result.answers.push(record),
                RecordSection::Authority => result.authorities.push(record),
                RecordSection::Additional => result.resources.push(record),
            }
        }

        Ok(result)
    }

    /// All records in wire order, tagged with their section
    pub fn resource_records(&self) -> Vec<ResourceRecord> {
        let answers = self
            .answers
            .iter()
            .map(|rec| ResourceRecord::from_record(RecordSection::Answer, rec));
        let authorities = self
            .authorities
            .iter()
            .map(|rec| ResourceRecord::from_record(RecordSection::Authority, rec));
        let resources = self
            .resources
            .iter()
            .map(|rec| ResourceRecord::from_record(RecordSection::Additional, rec));

        answers.chain(authorities).chain(resources).collect()
    }

    /// Encode the packet, updating `header.payload_size` to match
    pub fn write<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        let records = self.resource_records();

        let payload_size = records
            .iter()
            .fold(self.question.binary_len(), |size, rec| size + rec.binary_len());
        if payload_size > u16::MAX as usize {
            return Err(ProtocolError::TooLong);
        }
        self.header.payload_size = payload_size as u16;

        self.header.write(buffer)?;
        self.question.write(buffer)?;
        for rec in &records {
            rec.write(buffer)?;
        }

        Ok(())
    }
}
