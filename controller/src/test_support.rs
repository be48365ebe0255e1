use std::{net::SocketAddr, sync::Arc, time::Duration};

use proto::{
    Event,
    events::{MajorHeartbeat, Registration, RegistrationReport},
};

use crate::{
    Controller, ControllerSettings, controller_state::state_snapshot::ControllerSnapshot,
};

pub use utilities::transport::PeerHandle;

pub trait ControllerPeer {
    async fn register_chunk_server(&mut self, port: i32) -> RegistrationReport;
    async fn register_client(&mut self) -> RegistrationReport;
    async fn major_heartbeat(&self, chunks: &[&str], free_space: i64);
}

fn registration(peer: &PeerHandle, port: i32) -> Registration {
    Registration {
        ip: peer.connection().local_addr().ip(),
        port,
    }
}

impl ControllerPeer for PeerHandle {
    async fn register_chunk_server(&mut self, port: i32) -> RegistrationReport {
        self.send(Event::RegisterChunkServer(registration(self, port)))
            .await;
        match self.next_event().await {
            Event::ReportChunkServerRegistration(report) => report,
            other => panic!("unexpected {other:?}"),
        }
    }

    async fn register_client(&mut self) -> RegistrationReport {
        self.send(Event::RegisterClient(registration(self, 0))).await;
        match self.next_event().await {
            Event::ReportClientRegistration(report) => report,
            other => panic!("unexpected {other:?}"),
        }
    }

    async fn major_heartbeat(&self, chunks: &[&str], free_space: i64) {
        self.send(Event::MajorHeartbeat(MajorHeartbeat {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            free_space,
        }))
        .await;
    }
}

pub async fn start_controller(settings: ControllerSettings) -> (Arc<Controller>, SocketAddr) {
    let controller = Controller::new(settings);
    let addr = controller.start("127.0.0.1:0").await.unwrap();
    (controller, addr)
}

pub fn quiet_settings() -> ControllerSettings {
    ControllerSettings {
        liveness_interval: Duration::from_secs(3600),
        ..ControllerSettings::default()
    }
}

pub async fn wait_for(controller: &Controller, check: impl Fn(&ControllerSnapshot) -> bool) {
    for _ in 0..250 {
        if check(&controller.snapshot().await) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("controller never reached the expected state");
}
