use proto::{
    Event,
    chunk::chunk_name,
    events::{ChunkServerAddress, FileInfo, Registration, RetrieveFileResponse},
};
use utilities::{
    logger::{error, info, instrument, trace, warn},
    transport::TcpConnection,
};

use crate::controller::{Controller, RegistrationKind};

impl Controller {
    #[instrument(name = "controller_client_registration", skip(self, registration, origin), fields(peer = %origin.peer_addr()))]
    pub(crate) async fn handle_client_registration(
        &self,
        registration: Registration,
        origin: &TcpConnection,
    ) {
        let report = self
            .register(RegistrationKind::Client, registration, origin)
            .await;
        if let Err(e) = origin.send(&Event::ReportClientRegistration(report)).await {
            error!(error = %e, "Error while sending client registration report");
        }
    }

    #[instrument(name = "controller_send_chunk_servers_to_client", skip(self, origin), fields(peer = %origin.peer_addr()))]
    pub(crate) async fn send_chunk_servers_to_client(&self, origin: &TcpConnection) {
        let replica_set: Vec<ChunkServerAddress> = {
            let state = self.state.lock().await;
            let Some(ids) = self.selection_policy.select_for_store(&state) else {
                warn!(
                    registered = state.chunk_servers.len(),
                    "Not enough chunk servers registered, dropping placement request"
                );
                return;
            };
            if let Some(client) = state.client_by_endpoint(&origin.peer_addr()) {
                trace!(client_id = client.id, ?ids, "Placement chosen");
            }
            ids.iter()
                .filter_map(|id| state.chunk_servers.get(id))
                .map(|registration| registration.address())
                .collect()
        };
        if let Err(e) = origin
            .send(&Event::ControllerSendsClientChunkServers(replica_set))
            .await
        {
            error!(error = %e, "Error while sending replica set to client");
        }
    }

    #[instrument(name = "controller_add_file", skip(self), fields(file_name = %file_info.file_name))]
    pub(crate) async fn add_file(&self, file_info: FileInfo) {
        info!(
            no_of_chunks = file_info.no_of_chunks,
            file_size = file_info.file_size,
            "File announced"
        );
        self.state.lock().await.files.push(file_info);
    }

    #[instrument(name = "controller_route_file_retrieval", skip(self, origin), fields(peer = %origin.peer_addr()))]
    pub(crate) async fn route_file_retrieval(&self, file_name: &str, origin: &TcpConnection) {
        let response = {
            let state = self.state.lock().await;
            let Some(file_info) = state.file_info(file_name) else {
                error!("Retrieval requested for an unknown file");
                return;
            };
            let chunk_servers = (1..=file_info.no_of_chunks)
                .map(|sequence_number| {
                    let name = chunk_name(file_name, sequence_number);
                    match state
                        .holders_of(&name)
                        .next()
                        .and_then(|id| state.chunk_servers.get(&id))
                    {
                        Some(holder) => holder.address(),
                        None => {
                            error!(chunk_name = %name, "No chunk server holds chunk");
                            ChunkServerAddress::missing()
                        }
                    }
                })
                .collect();
            RetrieveFileResponse {
                file_name: file_name.to_owned(),
                file_size: file_info.file_size,
                chunk_servers,
            }
        };
        if let Err(e) = origin.send(&Event::RetrieveFileResponse(response)).await {
            error!(error = %e, "Error while sending file locations");
        }
    }
}
