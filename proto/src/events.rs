use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::{
    codec::{ByteReader, ByteWriter, DecodeError, EncodeError},
    constants::{REPLICATION_FACTOR, STATUS_FAILURE, STATUS_SUCCESS},
    protocol::EventType,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub ip: IpAddr,
    pub port: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationReport {
    pub status: i32,
    pub info: String,
}

impl RegistrationReport {
    pub fn success(info: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS,
            info: info.into(),
        }
    }
    pub fn failure(info: impl Into<String>) -> Self {
        Self {
            status: STATUS_FAILURE,
            info: info.into(),
        }
    }
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

// empty host with port 0 marks a slot the controller could not fill
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkServerAddress {
    pub host: String,
    pub hostname: String,
    pub port: i32,
}

impl ChunkServerAddress {
    pub fn missing() -> Self {
        Self::default()
    }
    pub fn is_missing(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }
    pub fn endpoint(&self) -> String {
        match self.host.parse::<Ipv6Addr>() {
            Ok(_) => format!("[{}]:{}", self.host, self.port),
            Err(_) => format!("{}:{}", self.host, self.port),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaEndpoint {
    pub host: String,
    pub port: i32,
}

impl ReplicaEndpoint {
    pub fn endpoint(&self) -> String {
        match self.host.parse::<Ipv6Addr>() {
            Ok(_) => format!("[{}]:{}", self.host, self.port),
            Err(_) => format!("{}:{}", self.host, self.port),
        }
    }
}

impl From<&ChunkServerAddress> for ReplicaEndpoint {
    fn from(address: &ChunkServerAddress) -> Self {
        Self {
            host: address.host.clone(),
            port: address.port,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub file_name: String,
    pub no_of_chunks: i32,
    pub file_size: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreChunk {
    pub sequence_number: i32,
    pub version: i32,
    pub file_name: String,
    pub chunk: Vec<u8>,
    pub next_chunk_servers: Vec<ReplicaEndpoint>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrieveFileResponse {
    pub file_name: String,
    pub file_size: i32,
    pub chunk_servers: Vec<ChunkServerAddress>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrieveChunkResponse {
    pub chunk_name: String,
    pub chunk: Vec<u8>,
    pub chunk_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixCorruptChunk {
    pub chunk_name: String,
    pub source: ChunkServerAddress,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MajorHeartbeat {
    pub chunks: Vec<String>,
    pub free_space: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinorHeartbeat {
    pub new_chunks: Vec<String>,
    pub free_space: i64,
    pub delta: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    ClientRequestsChunkServers,
    ControllerSendsClientChunkServers(Vec<ChunkServerAddress>),
    RegisterClient(Registration),
    ReportClientRegistration(RegistrationReport),
    RegisterChunkServer(Registration),
    ReportChunkServerRegistration(RegistrationReport),
    StoreChunk(StoreChunk),
    MajorHeartbeat(MajorHeartbeat),
    MinorHeartbeat(MinorHeartbeat),
    RetrieveFileRequest { file_name: String },
    RetrieveFileResponse(RetrieveFileResponse),
    SendFileInfo(FileInfo),
    RetrieveChunkRequest { chunk_name: String },
    RetrieveChunkResponse(RetrieveChunkResponse),
    ReportChunkCorruption { chunk_name: String },
    FixCorruptChunk(FixCorruptChunk),
    LivenessHeartbeat,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::ClientRequestsChunkServers => EventType::ClientRequestsChunkServersFromController,
            Event::ControllerSendsClientChunkServers(_) => {
                EventType::ControllerSendsClientChunkServers
            }
            Event::RegisterClient(_) => EventType::RegisterClient,
            Event::ReportClientRegistration(_) => EventType::ReportClientRegistration,
            Event::RegisterChunkServer(_) => EventType::RegisterChunkServer,
            Event::ReportChunkServerRegistration(_) => EventType::ReportChunkServerRegistration,
            Event::StoreChunk(_) => EventType::StoreChunk,
            Event::MajorHeartbeat(_) => EventType::SendMajorHeartbeat,
            Event::MinorHeartbeat(_) => EventType::SendMinorHeartbeat,
            Event::RetrieveFileRequest { .. } => EventType::RetrieveFileRequest,
            Event::RetrieveFileResponse(_) => EventType::RetrieveFileResponse,
            Event::SendFileInfo(_) => EventType::SendFileInfo,
            Event::RetrieveChunkRequest { .. } => EventType::RetrieveChunkRequest,
            Event::RetrieveChunkResponse(_) => EventType::RetrieveChunkResponse,
            Event::ReportChunkCorruption { .. } => EventType::ReportChunkCorruption,
            Event::FixCorruptChunk(_) => EventType::FixCorruptChunk,
            Event::LivenessHeartbeat => EventType::LivenessHeartbeat,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut writer = ByteWriter::new(self.event_type());
        match self {
            Event::ClientRequestsChunkServers | Event::LivenessHeartbeat => {}
            Event::ControllerSendsClientChunkServers(chunk_servers) => {
                if chunk_servers.len() != REPLICATION_FACTOR {
                    return Err(EncodeError::WrongEntryCount {
                        field: "chunk_servers",
                        expected: REPLICATION_FACTOR,
                        actual: chunk_servers.len(),
                    });
                }
                for chunk_server in chunk_servers {
                    writer
                        .put_short_str("host", &chunk_server.host)?
                        .put_short_str("hostname", &chunk_server.hostname)?
                        .put_i32(chunk_server.port);
                }
            }
            Event::RegisterClient(registration) | Event::RegisterChunkServer(registration) => {
                let ip = match registration.ip {
                    IpAddr::V4(v4) => v4.octets().to_vec(),
                    IpAddr::V6(v6) => v6.octets().to_vec(),
                };
                writer.put_short_bytes("ip", &ip)?.put_i32(registration.port);
            }
            Event::ReportClientRegistration(report)
            | Event::ReportChunkServerRegistration(report) => {
                writer
                    .put_i32(report.status)
                    .put_short_str("info", &report.info)?;
            }
            Event::StoreChunk(store) => {
                writer
                    .put_i32(store.sequence_number)
                    .put_i32(store.version)
                    .put_long_str("file_name", &store.file_name)?
                    .put_long_bytes("chunk", &store.chunk)?
                    .put_count("next_chunk_servers", store.next_chunk_servers.len())?;
                for next in &store.next_chunk_servers {
                    writer.put_long_str("host", &next.host)?.put_i32(next.port);
                }
            }
            Event::MajorHeartbeat(heartbeat) => {
                writer.put_count("chunks", heartbeat.chunks.len())?;
                for chunk_name in &heartbeat.chunks {
                    writer.put_long_str("chunk_name", chunk_name)?;
                }
                writer.put_i64(heartbeat.free_space);
            }
            Event::MinorHeartbeat(heartbeat) => {
                writer
                    .put_count("new_chunks", heartbeat.new_chunks.len())?
                    .put_i64(heartbeat.free_space)
                    .put_i32(heartbeat.delta);
                for chunk_name in &heartbeat.new_chunks {
                    writer.put_long_str("chunk_name", chunk_name)?;
                }
            }
            Event::RetrieveFileRequest { file_name } => {
                writer.put_long_str("file_name", file_name)?;
            }
            Event::RetrieveFileResponse(response) => {
                writer
                    .put_long_str("file_name", &response.file_name)?
                    .put_count("no_of_chunks", response.chunk_servers.len())?
                    .put_i32(response.file_size);
                for chunk_server in &response.chunk_servers {
                    writer.put_long_str("host", &chunk_server.host)?;
                }
                for chunk_server in &response.chunk_servers {
                    writer.put_long_str("hostname", &chunk_server.hostname)?;
                }
                for chunk_server in &response.chunk_servers {
                    writer.put_i32(chunk_server.port);
                }
            }
            Event::SendFileInfo(info) => {
                writer
                    .put_long_str("file_name", &info.file_name)?
                    .put_i32(info.no_of_chunks)
                    .put_i32(info.file_size);
            }
            Event::RetrieveChunkRequest { chunk_name }
            | Event::ReportChunkCorruption { chunk_name } => {
                writer.put_long_str("chunk_name", chunk_name)?;
            }
            Event::RetrieveChunkResponse(response) => {
                writer
                    .put_long_str("chunk_name", &response.chunk_name)?
                    .put_long_bytes("chunk", &response.chunk)?
                    .put_long_str("chunk_hash", &response.chunk_hash)?;
            }
            Event::FixCorruptChunk(fix) => {
                writer
                    .put_long_str("chunk_name", &fix.chunk_name)?
                    .put_long_str("host", &fix.source.host)?
                    .put_long_str("hostname", &fix.source.hostname)?
                    .put_i32(fix.source.port);
            }
        }
        Ok(writer.finish())
    }

    pub fn decode(payload: &[u8]) -> Result<Event, DecodeError> {
        let (&tag, body) = payload.split_first().ok_or(DecodeError::Empty)?;
        let event_type = EventType::try_from(tag)?;
        let mut reader = ByteReader::new(body);
        let event = match event_type {
            EventType::ClientRequestsChunkServersFromController => {
                Event::ClientRequestsChunkServers
            }
            EventType::LivenessHeartbeat => Event::LivenessHeartbeat,
            EventType::ControllerSendsClientChunkServers => {
                let mut chunk_servers = Vec::with_capacity(REPLICATION_FACTOR);
                for _ in 0..REPLICATION_FACTOR {
                    chunk_servers.push(ChunkServerAddress {
                        host: reader.get_short_string("host")?,
                        hostname: reader.get_short_string("hostname")?,
                        port: reader.get_i32("port")?,
                    });
                }
                Event::ControllerSendsClientChunkServers(chunk_servers)
            }
            EventType::RegisterClient => Event::RegisterClient(read_registration(&mut reader)?),
            EventType::RegisterChunkServer => {
                Event::RegisterChunkServer(read_registration(&mut reader)?)
            }
            EventType::ReportClientRegistration => {
                Event::ReportClientRegistration(read_report(&mut reader)?)
            }
            EventType::ReportChunkServerRegistration => {
                Event::ReportChunkServerRegistration(read_report(&mut reader)?)
            }
            EventType::StoreChunk => {
                let sequence_number = reader.get_i32("sequence_number")?;
                let version = reader.get_i32("version")?;
                let file_name = reader.get_long_string("file_name")?;
                let chunk = reader.get_long_bytes("chunk")?.to_vec();
                let remaining = reader.get_count("next_chunk_servers")?;
                let mut next_chunk_servers = Vec::with_capacity(remaining.min(REPLICATION_FACTOR));
                for _ in 0..remaining {
                    next_chunk_servers.push(ReplicaEndpoint {
                        host: reader.get_long_string("host")?,
                        port: reader.get_i32("port")?,
                    });
                }
                Event::StoreChunk(StoreChunk {
                    sequence_number,
                    version,
                    file_name,
                    chunk,
                    next_chunk_servers,
                })
            }
            EventType::SendMajorHeartbeat => {
                let chunks = read_names(&mut reader, "chunks")?;
                let free_space = reader.get_i64("free_space")?;
                Event::MajorHeartbeat(MajorHeartbeat { chunks, free_space })
            }
            EventType::SendMinorHeartbeat => {
                let count = reader.get_count("new_chunks")?;
                let free_space = reader.get_i64("free_space")?;
                let delta = reader.get_i32("delta")?;
                let mut new_chunks = Vec::with_capacity(count.min(reader.remaining()));
                for _ in 0..count {
                    new_chunks.push(reader.get_long_string("chunk_name")?);
                }
                Event::MinorHeartbeat(MinorHeartbeat {
                    new_chunks,
                    free_space,
                    delta,
                })
            }
            EventType::RetrieveFileRequest => Event::RetrieveFileRequest {
                file_name: reader.get_long_string("file_name")?,
            },
            EventType::RetrieveFileResponse => {
                let file_name = reader.get_long_string("file_name")?;
                let no_of_chunks = reader.get_count("no_of_chunks")?;
                let file_size = reader.get_i32("file_size")?;
                let mut hosts = Vec::with_capacity(no_of_chunks.min(reader.remaining()));
                for _ in 0..no_of_chunks {
                    hosts.push(reader.get_long_string("host")?);
                }
                let mut hostnames = Vec::with_capacity(hosts.len());
                for _ in 0..no_of_chunks {
                    hostnames.push(reader.get_long_string("hostname")?);
                }
                let mut chunk_servers = Vec::with_capacity(hosts.len());
                for (host, hostname) in hosts.into_iter().zip(hostnames) {
                    chunk_servers.push(ChunkServerAddress {
                        host,
                        hostname,
                        port: reader.get_i32("port")?,
                    });
                }
                Event::RetrieveFileResponse(RetrieveFileResponse {
                    file_name,
                    file_size,
                    chunk_servers,
                })
            }
            EventType::SendFileInfo => Event::SendFileInfo(FileInfo {
                file_name: reader.get_long_string("file_name")?,
                no_of_chunks: reader.get_i32("no_of_chunks")?,
                file_size: reader.get_i32("file_size")?,
            }),
            EventType::RetrieveChunkRequest => Event::RetrieveChunkRequest {
                chunk_name: reader.get_long_string("chunk_name")?,
            },
            EventType::RetrieveChunkResponse => {
                Event::RetrieveChunkResponse(RetrieveChunkResponse {
                    chunk_name: reader.get_long_string("chunk_name")?,
                    chunk: reader.get_long_bytes("chunk")?.to_vec(),
                    chunk_hash: reader.get_long_string("chunk_hash")?,
                })
            }
            EventType::ReportChunkCorruption => Event::ReportChunkCorruption {
                chunk_name: reader.get_long_string("chunk_name")?,
            },
            EventType::FixCorruptChunk => Event::FixCorruptChunk(FixCorruptChunk {
                chunk_name: reader.get_long_string("chunk_name")?,
                source: ChunkServerAddress {
                    host: reader.get_long_string("host")?,
                    hostname: reader.get_long_string("hostname")?,
                    port: reader.get_i32("port")?,
                },
            }),
        };
        reader.finish(event_type)?;
        Ok(event)
    }
}

fn read_registration(reader: &mut ByteReader<'_>) -> Result<Registration, DecodeError> {
    let raw = reader.get_short_bytes("ip")?;
    let ip = match raw.len() {
        4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(raw);
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(raw);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        other => return Err(DecodeError::InvalidIpLength(other)),
    };
    let port = reader.get_i32("port")?;
    Ok(Registration { ip, port })
}

fn read_report(reader: &mut ByteReader<'_>) -> Result<RegistrationReport, DecodeError> {
    Ok(RegistrationReport {
        status: reader.get_i32("status")?,
        info: reader.get_short_string("info")?,
    })
}

fn read_names(reader: &mut ByteReader<'_>, field: &'static str) -> Result<Vec<String>, DecodeError> {
    let count = reader.get_count(field)?;
    let mut names = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        names.push(reader.get_long_string("chunk_name")?);
    }
    Ok(names)
}
