//! Plugin that writes the log stream to a file
//!
//! Configuration options:
//!
//! ```toml
//! [plugin.log]
//! # (REQUIRED) File the log stream is written to
//! filename = "server.log"
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::Context;
use async_trait::async_trait;

use crate::config::PluginConfig;
use crate::dispatch::{Dispatcher, Subscriber};
use crate::logs::LogEvent;

pub struct LogFilePlugin {
    out: Option<BufWriter<File>>,
}

pub(super) fn init(dispatcher: &mut Dispatcher, config: &PluginConfig) -> anyhow::Result<()> {
    let filename = config
        .get_str("filename")
        .context("[plugin.log] requires a 'filename' option")?;
    let file =
        File::create(filename).with_context(|| format!("cannot open log file '{}'", filename))?;

    dispatcher.register(Box::new(LogFilePlugin {
        out: Some(BufWriter::new(file)),
    }));
    Ok(())
}

#[async_trait]
impl Subscriber for LogFilePlugin {
    fn name(&self) -> &str {
        "log"
    }

    async fn on_event(&mut self, event: &LogEvent) -> anyhow::Result<()> {
        match event {
            LogEvent::Message { timestamp, message } => {
                if let Some(out) = self.out.as_mut() {
                    writeln!(out, "{}: {}", timestamp, String::from_utf8_lossy(message))?;
                }
            }
            LogEvent::Shutdown => {
                if let Some(mut out) = self.out.take() {
                    out.flush()?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_lines_and_closes_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stream.log");

        let mut dispatcher = Dispatcher::new();
        let config = PluginConfig::from(HashMap::from([(
            "filename".to_string(),
            path.to_string_lossy().to_string(),
        )]));
        init(&mut dispatcher, &config).unwrap();

        let timestamp = NaiveDate::from_ymd_opt(2016, 11, 20)
            .unwrap()
            .and_hms_opt(13, 5, 40)
            .unwrap();
        dispatcher
            .dispatch(&LogEvent::Message {
                timestamp,
                message: b"World triggered \"Round_Start\"".to_vec(),
            })
            .await;
        dispatcher.dispatch(&LogEvent::Shutdown).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "2016-11-20 13:05:40: World triggered \"Round_Start\"\n"
        );
    }

    #[test]
    fn init_fails_without_a_filename() {
        let mut dispatcher = Dispatcher::new();
        let err = init(&mut dispatcher, &PluginConfig::default()).unwrap_err();
        assert!(err.to_string().contains("filename"));
        assert!(dispatcher.is_empty());
    }
}
