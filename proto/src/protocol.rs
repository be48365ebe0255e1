use std::fmt::Display;

use crate::codec::DecodeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    ClientRequestsChunkServersFromController = 2,
    ControllerSendsClientChunkServers = 3,
    RegisterClient = 4,
    ReportClientRegistration = 5,
    RegisterChunkServer = 6,
    ReportChunkServerRegistration = 7,
    StoreChunk = 8,
    SendMajorHeartbeat = 9,
    SendMinorHeartbeat = 10,
    RetrieveFileRequest = 11,
    RetrieveFileResponse = 12,
    SendFileInfo = 13,
    RetrieveChunkRequest = 14,
    RetrieveChunkResponse = 15,
    ReportChunkCorruption = 16,
    FixCorruptChunk = 17,
    LivenessHeartbeat = 18,
}

impl EventType {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for EventType {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        let event_type = match tag {
            2 => EventType::ClientRequestsChunkServersFromController,
            3 => EventType::ControllerSendsClientChunkServers,
            4 => EventType::RegisterClient,
            5 => EventType::ReportClientRegistration,
            6 => EventType::RegisterChunkServer,
            7 => EventType::ReportChunkServerRegistration,
            8 => EventType::StoreChunk,
            9 => EventType::SendMajorHeartbeat,
            10 => EventType::SendMinorHeartbeat,
            11 => EventType::RetrieveFileRequest,
            12 => EventType::RetrieveFileResponse,
            13 => EventType::SendFileInfo,
            14 => EventType::RetrieveChunkRequest,
            15 => EventType::RetrieveChunkResponse,
            16 => EventType::ReportChunkCorruption,
            17 => EventType::FixCorruptChunk,
            18 => EventType::LivenessHeartbeat,
            other => return Err(DecodeError::UnknownTag(other)),
        };
        Ok(event_type)
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let literal = match self {
            EventType::ClientRequestsChunkServersFromController => {
                "CLIENT_REQUESTS_CHUNK_SERVERS_FROM_CONTROLLER"
            }
            EventType::ControllerSendsClientChunkServers => "CONTROLLER_SENDS_CLIENT_CHUNK_SERVERS",
            EventType::RegisterClient => "REGISTER_CLIENT",
            EventType::ReportClientRegistration => "REPORT_CLIENT_REGISTRATION",
            EventType::RegisterChunkServer => "REGISTER_CHUNK_SERVER",
            EventType::ReportChunkServerRegistration => "REPORT_CHUNK_SERVER_REGISTRATION",
            EventType::StoreChunk => "STORE_CHUNK",
            EventType::SendMajorHeartbeat => "SEND_MAJOR_HEARTBEAT",
            EventType::SendMinorHeartbeat => "SEND_MINOR_HEARTBEAT",
            EventType::RetrieveFileRequest => "RETRIEVE_FILE_REQUEST",
            EventType::RetrieveFileResponse => "RETRIEVE_FILE_RESPONSE",
            EventType::SendFileInfo => "SEND_FILE_INFO",
            EventType::RetrieveChunkRequest => "RETRIEVE_CHUNK_REQUEST",
            EventType::RetrieveChunkResponse => "RETRIEVE_CHUNK_RESPONSE",
            EventType::ReportChunkCorruption => "REPORT_CHUNK_CORRUPTION",
            EventType::FixCorruptChunk => "FIX_CORRUPT_CHUNK",
            EventType::LivenessHeartbeat => "LIVENESS_HEARTBEAT",
        };
        write!(f, "{literal}")
    }
}
