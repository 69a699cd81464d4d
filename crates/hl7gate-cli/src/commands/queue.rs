//! Queue inspection commands.
//!
//! These open the queue database directly, so they also work while the
//! gateway is stopped.

use std::path::Path;

use hl7gate_server::{DurableQueue, QueueItem};

use crate::config::GatewaySettings;
use crate::error::CliResult;

async fn open(settings: &GatewaySettings, path: Option<&Path>) -> CliResult<DurableQueue> {
    Ok(DurableQueue::open(settings.queue.to_queue_config(path)).await?)
}

/// `hl7gate queue count`
pub async fn count(settings: &GatewaySettings, path: Option<&Path>) -> CliResult<()> {
    let queue = open(settings, path).await?;
    println!("{}", queue.count().await?);
    Ok(())
}

/// `hl7gate queue peek`
pub async fn peek(
    settings: &GatewaySettings,
    path: Option<&Path>,
    limit: usize,
    json: bool,
) -> CliResult<()> {
    let queue = open(settings, path).await?;
    let items = queue.peek(limit).await?;
    println!("{}", render_items(&items, json)?);
    Ok(())
}

fn render_items(items: &[QueueItem], json: bool) -> CliResult<String> {
    if json {
        return Ok(serde_json::to_string_pretty(items)?);
    }
    if items.is_empty() {
        return Ok("Queue is empty.".to_string());
    }

    let blocks: Vec<String> = items
        .iter()
        .map(|item| {
            let segments = item.payload.trim_end_matches('\r').replace('\r', "\n    ");
            format!("#{}\n    {}", item.sequence_id, segments)
        })
        .collect();
    Ok(blocks.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<QueueItem> {
        vec![
            QueueItem {
                sequence_id: 7,
                payload: "MSH|^~\\&|A\rPID|1\r".to_string(),
            },
            QueueItem {
                sequence_id: 8,
                payload: "MSH|^~\\&|B".to_string(),
            },
        ]
    }

    #[test]
    fn renders_text_blocks() {
        assert_eq!(
            render_items(&items(), false).unwrap(),
            "#7\n    MSH|^~\\&|A\n    PID|1\n#8\n    MSH|^~\\&|B"
        );
        assert_eq!(render_items(&[], false).unwrap(), "Queue is empty.");
    }

    #[test]
    fn renders_json() {
        let json = render_items(&items(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["sequence_id"], 7);
        assert_eq!(value[1]["payload"], "MSH|^~\\&|B");
    }

    #[tokio::test]
    async fn path_override_opens_that_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inspect.db");
        let settings = GatewaySettings::default();

        let queue = open(&settings, Some(path.as_path())).await.unwrap();
        queue.enqueue("MSH|^~\\&|A").await.unwrap();
        assert_eq!(queue.path(), path.as_path());

        let reopened = open(&settings, Some(path.as_path())).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
