mod fetch_file_handler;
mod store_file_handler;

use std::sync::Arc;

pub use fetch_file_handler::FetchFileHandler;
pub use store_file_handler::StoreFileHandler;
use utilities::result::Result;

use crate::client::Client;

const HELP: &str = "\nstore command : store local_file_path\nretrieve command : retrieve remote_file_name\nhelp command : help\n";

pub struct CommandRunner {
    store_file_handler: StoreFileHandler,
    fetch_file_handler: FetchFileHandler,
}

impl CommandRunner {
    pub fn new(client: Arc<Client>) -> Self {
        CommandRunner {
            store_file_handler: StoreFileHandler::new(client.clone()),
            fetch_file_handler: FetchFileHandler::new(client),
        }
    }

    pub async fn handle_input(&self, command: &str) -> Result<String> {
        let inputs: Vec<&str> = command.split_whitespace().collect();
        match inputs.as_slice() {
            ["store", local_file_path] => {
                let file_name = self.store_file_handler.store_file(local_file_path).await?;
                Ok(format!("{file_name} stored"))
            }
            ["store", ..] => {
                Err("Invalid store command usage please use <help> to get help".into())
            }
            ["retrieve", remote_file_name] => {
                let path = self.fetch_file_handler.fetch_file(remote_file_name).await?;
                Ok(format!("{remote_file_name} retrieved to {}", path.display()))
            }
            ["retrieve", ..] => {
                Err("Invalid retrieve command usage please use <help> to get help".into())
            }
            ["help"] => Ok(HELP.to_owned()),
            _ => Err(
                "Invalid Command Please use valid command use :help to list available commands"
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::ClientSettings;

    fn runner() -> CommandRunner {
        CommandRunner::new(Client::new(ClientSettings {
            output_dir: std::env::temp_dir(),
            reply_timeout: Duration::from_millis(100),
        }))
    }

    #[tokio::test]
    async fn help_and_malformed_commands() {
        let runner = runner();
        assert!(runner.handle_input("help\n").await.unwrap().contains("store"));
        assert!(runner.handle_input("store").await.is_err());
        assert!(runner.handle_input("retrieve a b").await.is_err());
        assert!(runner.handle_input("delete x").await.is_err());
        assert!(runner.handle_input("").await.is_err());
    }

    #[tokio::test]
    async fn commands_need_a_controller() {
        let runner = runner();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();
        let error = runner
            .handle_input(&format!("store {}", path.display()))
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "not connected to a controller");

        let error = runner.handle_input("store /no/such/file").await.unwrap_err();
        assert!(error.to_string().ends_with("not found"));
    }
}
