use async_trait::async_trait;
use eyre::{Result, eyre};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use super::Command;
use bouquet_core::config::BotConfig;
use bouquet_core::flow::{FlowEngine, Inbound, OutboundMessage, Outbox};
use bouquet_core::upload::NullUploader;

pub struct RunCommand {
    pub config: BotConfig,
    pub db: PathBuf,
}

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self) -> Result<()> {
        let repo = crate::open_repository(&self.db).await?;
        let sessions = crate::open_session_store(&self.db).await?;
        let (outbox, rx) = Outbox::channel();
        let engine = FlowEngine::new(
            self.config.clone(),
            sessions,
            repo.clone(),
            Arc::new(NullUploader),
            outbox,
        );

        info!(target: "bouquet::run", db = %self.db.display(), "Reading events from stdin");
        let stdin = BufReader::new(tokio::io::stdin());
        pump(engine, rx, stdin, tokio::io::stdout()).await?;

        repo.close().await;
        Ok(())
    }
}

/// Feeds JSON lines from `reader` to `engine` and writes every reply to
/// `writer` as one JSON line. At end of input, waits for pending albums and
/// returns the writer once the last reply is flushed.
pub async fn pump<R, W>(
    engine: FlowEngine,
    rx: UnboundedReceiver<OutboundMessage>,
    reader: R,
    writer: W,
) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let printer = tokio::spawn(write_replies(rx, writer));

    let mut lines = reader.lines();
    let mut handled = 0usize;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Inbound>(line) {
            Ok(event) => {
                engine
                    .handle(event)
                    .await
                    .map_err(|e| eyre!("Reply channel failed: {}", e))?;
                handled += 1;
            }
            Err(e) => warn!(target: "bouquet::run", error = %e, "Skipping malformed event"),
        }
    }

    debug!(target: "bouquet::run", handled, "Input closed, waiting for pending albums");
    engine.wait_idle().await;
    drop(engine);

    printer
        .await
        .map_err(|e| eyre!("Reply writer task failed: {}", e))?
}

async fn write_replies<W>(mut rx: UnboundedReceiver<OutboundMessage>, mut writer: W) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bouquet_core::repository::BouquetRepository;
    use bouquet_core::session::InMemorySessionStore;

    #[tokio::test]
    async fn replies_are_written_as_json_lines() {
        let mut config = BotConfig::default();
        config.media.quiet_window_ms = 10;
        let (outbox, rx) = Outbox::channel();
        let engine = FlowEngine::new(
            config,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(BouquetRepository::new_in_memory().await.unwrap()),
            Arc::new(NullUploader),
            outbox,
        );

        let input = concat!(
            r#"{"type":"command","conversation_id":5,"command":"new_bouquet"}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"type":"text","conversation_id":5,"text":"Spring"}"#,
            "\n",
            r#"{"type":"action","conversation_id":5,"data":"flow:next"}"#,
            "\n",
            r#"{"type":"attachment","conversation_id":5,"item_ref":"p1","batch_id":"g"}"#,
            "\n",
        );

        let output = pump(engine, rx, input.as_bytes(), Vec::new()).await.unwrap();
        let replies: Vec<OutboundMessage> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(replies.len(), 4);
        assert!(replies[0].text.contains("№0201"));
        assert!(replies[1].text.contains("Spring"));
        assert_eq!(replies[3].text, "Added 1 photo(s). Total: 1/6.");
    }
}
