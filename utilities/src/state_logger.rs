use std::path::Path;

use serde::Serialize;
use tokio::{fs::File, io::AsyncWriteExt, sync::mpsc};

use crate::logger::{error, trace};
use crate::result::Result;

pub struct StateLogger<T>
where
    T: PartialEq + Serialize + Send + 'static,
{
    last_written: Option<T>,
    file: File,
}

impl<T> StateLogger<T>
where
    T: PartialEq + Serialize + Send + 'static,
{
    pub async fn start(target_file_path: &Path) -> Result<mpsc::Sender<T>> {
        if let Some(parent) = target_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = File::options()
            .append(true)
            .create(true)
            .open(target_file_path)
            .await?;
        let (tx, mut rx) = mpsc::channel::<T>(10);
        let mut state_logger = Self {
            last_written: None,
            file,
        };
        tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                if state_logger.last_written.as_ref() == Some(&snapshot) {
                    trace!("Snapshot unchanged, skipping");
                    continue;
                }
                if let Err(e) = state_logger.append(snapshot).await {
                    error!(error = %e, "Error while appending state snapshot");
                }
            }
        });
        Ok(tx)
    }

    async fn append(&mut self, snapshot: T) -> Result<()> {
        let mut json_line = serde_json::to_vec(&snapshot)?;
        json_line.push(b'\n');
        self.file.write_all(&json_line).await?;
        self.file.flush().await?;
        self.last_written = Some(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(PartialEq, Serialize)]
    struct Counter {
        value: u32,
    }

    #[tokio::test]
    async fn only_changed_snapshots_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.log");
        let tx = StateLogger::<Counter>::start(&path).await.unwrap();
        for value in [1, 1, 2, 2, 2, 3] {
            tx.send(Counter { value }).await.unwrap();
        }
        drop(tx);

        let mut lines = Vec::new();
        for _ in 0..50 {
            let content = tokio::fs::read_to_string(&path).await.unwrap();
            lines = content.lines().map(str::to_owned).collect::<Vec<_>>();
            if lines.len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(lines, vec![r#"{"value":1}"#, r#"{"value":2}"#, r#"{"value":3}"#]);
    }
}
