use chunkserver::{ChunkServer, ChunkServerSettings, config::CONFIG};
use utilities::{
    logger::{error, info, init_logger},
    result::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logger(
        "ChunkServer",
        &CONFIG.id,
        &CONFIG.log_level,
        &CONFIG.log_base,
        CONFIG.apm_endpoint.as_deref(),
    )?;
    let chunk_server = ChunkServer::new(ChunkServerSettings::from(&*CONFIG)).await?;
    // a denied or unanswered registration ends the process
    let local_addr = match chunk_server
        .start(&CONFIG.listen_addrs, &CONFIG.controller_addrs)
        .await
    {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, controller_addrs = %CONFIG.controller_addrs, "Error while starting the chunk server, shutting down");
            return Err(e);
        }
    };
    info!(%local_addr, id = %chunk_server.id(), "Chunk server ready");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
