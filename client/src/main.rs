use client::{Client, ClientSettings, command_runner::CommandRunner, config::CONFIG};
use tokio::io::{AsyncBufReadExt, BufReader};
use utilities::{
    logger::{error, info, init_logger},
    result::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logger(
        "Client",
        &CONFIG.id,
        &CONFIG.log_level,
        &CONFIG.log_base,
        CONFIG.apm_endpoint.as_deref(),
    )?;
    let client = Client::new(ClientSettings::from(&*CONFIG));
    if let Err(e) = client
        .start(&CONFIG.listen_addrs, &CONFIG.controller_addrs)
        .await
    {
        error!(error = %e, controller_addrs = %CONFIG.controller_addrs, "Error while starting the client, shutting down");
        return Err(e.into());
    }
    let command_runner = CommandRunner::new(client);
    info!("starting the Client");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(input)) => match command_runner.handle_input(&input).await {
                Ok(message) => println!("Success : {message}"),
                Err(message) => println!("Error : {message}"),
            },
            Ok(None) => break,
            Err(e) => println!("error while reading the command {e:?}"),
        }
    }
    Ok(())
}
