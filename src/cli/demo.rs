use anyhow::{anyhow, Result};
use clap::Args;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::app::Shell;
use crate::config::ShellConfig;
use crate::dialog::{dialog_names, CloseDecision, CloseOutcome, DialogProps};

/// Run a scripted show/close session
#[derive(Args, Debug, Default)]
pub struct DemoCommand {
    /// Override the settle delay in milliseconds
    #[arg(long = "settle-ms")]
    pub settle_ms: Option<u64>,

    /// Print one JSON object per line instead of pretty output
    #[arg(short = 'q', long = "compact")]
    pub compact: bool,
}

impl DemoCommand {
    pub async fn execute(&self, config: &ShellConfig) -> Result<()> {
        debug!("Executing demo command");
        let steps = self.run(config).await?;
        for step in steps {
            let line = if self.compact {
                serde_json::to_string(&step)?
            } else {
                serde_json::to_string_pretty(&step)?
            };
            println!("{}", line);
        }
        Ok(())
    }

    /// Drive the session and collect one snapshot per step
    pub async fn run(&self, config: &ShellConfig) -> Result<Vec<Value>> {
        let mut config = config.clone();
        if let Some(settle_ms) = self.settle_ms {
            config.settle_delay_ms = settle_ms;
        }

        let shell = Shell::new(config)?;
        let mut events = shell
            .events()
            .ok_or_else(|| anyhow!("Shell events unavailable"))?;
        let logger = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                info!("Shell event: {}", serde_json::to_string(&event).unwrap_or_default());
            }
        });

        let dialogs = shell.dialogs();
        let mut steps = Vec::new();
        let snapshot = |step: &str| json!({ "step": step, "visible": dialogs.visible() });

        let confirm = dialogs.get(dialog_names::CONFIRM, None);
        confirm.show(Some(props(json!({"title": "Delete photo?"}))), None).await?;
        steps.push(snapshot("show confirm"));

        let preview = dialogs.get_single(dialog_names::PHOTO_PREVIEW, None);
        preview.show(Some(props(json!({"index": 0}))), None).await?;
        dialogs
            .get_single(dialog_names::PHOTO_PREVIEW, None)
            .show(Some(props(json!({"index": 1}))), None)
            .await?;
        steps.push(snapshot("show photo preview twice"));

        confirm.before_close(|| async { CloseDecision::Block });
        let outcome = confirm.close().await;
        steps.push(snapshot(&format!("close guarded confirm: {:?}", outcome)));

        confirm.before_close(|| async { CloseDecision::Allow });
        if confirm.close().await != CloseOutcome::Closed {
            return Err(anyhow!("Confirm dialog refused to close"));
        }
        steps.push(snapshot("close confirm"));

        for title in ["First", "Second"] {
            dialogs
                .get(dialog_names::CONFIRM, None)
                .show(Some(props(json!({ "title": title }))), None)
                .await?;
        }
        steps.push(snapshot("stack two confirms"));

        let closed = shell.shutdown().await;
        steps.push(snapshot(&format!("close all ({} closed)", closed)));

        drop((confirm, preview, shell));
        let _ = tokio::time::timeout(Duration::from_secs(1), logger).await;
        Ok(steps)
    }
}

fn props(value: Value) -> DialogProps {
    match value {
        Value::Object(map) => map,
        _ => DialogProps::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_demo_steps() {
        let steps = DemoCommand::default().run(&ShellConfig::default()).await.unwrap();
        let counts: Vec<usize> = steps
            .iter()
            .map(|step| step["visible"].as_array().map_or(0, Vec::len))
            .collect();
        assert_eq!(counts, vec![1, 2, 2, 1, 3, 0]);

        assert_eq!(steps[1]["visible"][1]["props"]["index"], 1);
        assert_eq!(steps[2]["step"], "close guarded confirm: Blocked");
        assert_eq!(steps[5]["step"], "close all (3 closed)");
    }
}
