use controller::{
    Controller, ControllerSettings,
    config::CONFIG,
};
use utilities::{
    logger::{error, info, init_logger},
    result::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logger(
        "Controller",
        &CONFIG.id,
        &CONFIG.log_level,
        &CONFIG.log_base,
        CONFIG.apm_endpoint.as_deref(),
    )?;
    let controller = Controller::new(ControllerSettings::from(&*CONFIG));
    let local_addr = match controller.start(&CONFIG.listen_addrs).await {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, listen_addrs = %CONFIG.listen_addrs, "Error while starting the controller, shutting down");
            return Err(e);
        }
    };
    info!(%local_addr, "Controller ready");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
