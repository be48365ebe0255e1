use std::sync::Arc;

use proto::{
    Event,
    events::{MajorHeartbeat, MinorHeartbeat},
};
use tokio::time::{Instant, interval, interval_at};
use utilities::{
    logger::{Instrument, error, info_span, trace},
    result::Result,
};

use crate::chunk_server::ChunkServer;

pub struct HeartbeatLoop {
    chunk_server: Arc<ChunkServer>,
}

impl HeartbeatLoop {
    pub fn new(chunk_server: Arc<ChunkServer>) -> Self {
        Self { chunk_server }
    }

    pub fn start(self) {
        let chunk_server = self.chunk_server.clone();
        tokio::spawn(
            async move {
                let mut ticker = interval(chunk_server.settings.major_heartbeat);
                loop {
                    ticker.tick().await;
                    if let Err(e) = chunk_server.send_major_heartbeat().await {
                        error!(error = %e, "Error while sending major heartbeat");
                    }
                }
            }
            .instrument(info_span!("chunk_server_major_heartbeat")),
        );
        let chunk_server = self.chunk_server;
        tokio::spawn(
            async move {
                let period = chunk_server.settings.minor_heartbeat;
                let mut ticker = interval_at(Instant::now() + period, period);
                loop {
                    ticker.tick().await;
                    if let Err(e) = chunk_server.send_minor_heartbeat().await {
                        error!(error = %e, "Error while sending minor heartbeat");
                    }
                }
            }
            .instrument(info_span!("chunk_server_minor_heartbeat")),
        );
    }
}

impl ChunkServer {
    pub(crate) async fn send_major_heartbeat(&self) -> Result<()> {
        let controller = self
            .controller_connection()
            .ok_or("not registered with a controller")?;
        let heartbeat = MajorHeartbeat {
            chunks: self.chunk_names().await,
            free_space: self.free_space(),
        };
        trace!(chunks = heartbeat.chunks.len(), free_space = heartbeat.free_space, "Sending major heartbeat");
        controller.send(&Event::MajorHeartbeat(heartbeat)).await?;
        Ok(())
    }

    pub(crate) async fn send_minor_heartbeat(&self) -> Result<()> {
        let controller = self
            .controller_connection()
            .ok_or("not registered with a controller")?;
        let new_chunks = self.state.lock().await.take_new_chunks();
        let heartbeat = MinorHeartbeat {
            delta: new_chunks.len() as i32,
            new_chunks,
            free_space: self.free_space(),
        };
        trace!(delta = heartbeat.delta, free_space = heartbeat.free_space, "Sending minor heartbeat");
        if let Err(e) = controller.send(&Event::MinorHeartbeat(heartbeat.clone())).await {
            // keep the chunks for the next try
            let mut state = self.state.lock().await;
            for chunk_name in heartbeat.new_chunks {
                state.note_new_chunk(chunk_name);
            }
            return Err(e.into());
        }
        Ok(())
    }
}
