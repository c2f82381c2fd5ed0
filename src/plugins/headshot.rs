//! Plugin that tracks headshot kills and answers chat queries
//!
//! Players ask for counts in chat: `!headshots` for their own count,
//! `!headshots <PLAYER>` for someone else's, `!headshots *` for everyone.
//! Answers go back through the server's `say` command.
//!
//! Configuration options:
//!
//! ```toml
//! [plugin.headshot]
//! # (OPTIONAL) When to reset counts: "never", "round" or "map".
//! # Defaults to never.
//! when_reset = "never"
//!
//! # (OPTIONAL) Whether bot kills are counted: "yes" or "no".
//! # Defaults to no.
//! count_bots = "no"
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PluginConfig;
use crate::dispatch::{Dispatcher, Subscriber};
use crate::logs::text::{contains, parse_player_info, quoted_strings};
use crate::logs::LogEvent;
use crate::rcon::RconClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetPolicy {
    Never,
    Round,
    Map,
}

fn parse_reset_policy(value: &str) -> anyhow::Result<ResetPolicy> {
    match value {
        "never" => Ok(ResetPolicy::Never),
        "round" => Ok(ResetPolicy::Round),
        "map" => Ok(ResetPolicy::Map),
        other => anyhow::bail!(
            "when_reset option of [plugin.headshot] must be never, round or map (got '{}')",
            other
        ),
    }
}

fn parse_count_bots(value: &str) -> anyhow::Result<bool> {
    match value {
        "yes" => Ok(true),
        "no" => Ok(false),
        other => anyhow::bail!(
            "count_bots option of [plugin.headshot] must be yes or no (got '{}')",
            other
        ),
    }
}

pub struct HeadshotPlugin {
    rcon: Arc<RconClient>,
    headshots: HashMap<Vec<u8>, u64>,
    reset_policy: ResetPolicy,
    count_bots: bool,
}

pub(super) fn init(
    rcon: &Arc<RconClient>,
    dispatcher: &mut Dispatcher,
    config: &PluginConfig,
) -> anyhow::Result<()> {
    let reset_policy = parse_reset_policy(config.get_or("when_reset", "never"))?;
    let count_bots = parse_count_bots(config.get_or("count_bots", "no"))?;

    dispatcher.register(Box::new(HeadshotPlugin {
        rcon: Arc::clone(rcon),
        headshots: HashMap::new(),
        reset_policy,
        count_bots,
    }));
    Ok(())
}

impl HeadshotPlugin {
    async fn say(&self, line: &str) -> anyhow::Result<()> {
        self.rcon
            .execute_command(&format!("say [HEADSHOTS] {}", line))
            .await?;
        Ok(())
    }

    fn record_kill(&mut self, message: &[u8]) {
        let quoted = quoted_strings(message);
        let Some(killer) = quoted.first().and_then(|blob| parse_player_info(blob)) else {
            return;
        };
        if killer.user_id == &b"BOT"[..] && !self.count_bots {
            return;
        }
        *self.headshots.entry(killer.name.to_vec()).or_insert(0) += 1;
    }

    async fn answer_query(&mut self, message: &[u8]) -> anyhow::Result<()> {
        let quoted = quoted_strings(message);
        let [requester, query] = quoted.as_slice() else {
            return Ok(());
        };

        let query = query.trim_ascii();
        let who: Vec<u8> = if query == &b"!headshots"[..] {
            match parse_player_info(requester) {
                Some(info) => info.name.to_vec(),
                None => return Ok(()),
            }
        } else {
            match query.splitn(2, |&b| b == b' ').nth(1) {
                Some(rest) => rest.to_vec(),
                None => {
                    self.say("Command must be either \"!headshots\" or \"!headshots <PLAYER>\" or \"!headshots *\"")
                        .await?;
                    return Ok(());
                }
            }
        };

        if who.as_slice() == &b"*"[..] {
            let counts: Vec<(Vec<u8>, u64)> = self
                .headshots
                .iter()
                .map(|(player, count)| (player.clone(), *count))
                .collect();
            for (player, count) in counts {
                self.say(&format!("{} has {}", String::from_utf8_lossy(&player), count))
                    .await?;
            }
        } else {
            let count = self.headshots.get(&who).copied().unwrap_or(0);
            self.say(&format!("{} has {}", String::from_utf8_lossy(&who), count))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Subscriber for HeadshotPlugin {
    fn name(&self) -> &str {
        "headshot"
    }

    async fn on_event(&mut self, event: &LogEvent) -> anyhow::Result<()> {
        let LogEvent::Message { message, .. } = event else {
            return Ok(());
        };

        if contains(message, b"(headshot)") {
            self.record_kill(message);
        } else if contains(message, b"\" say \"") && contains(message, b"!headshots") {
            self.answer_query(message).await?;
        } else if self.reset_policy == ResetPolicy::Round
            && message.as_slice() == &b"World triggered \"Round_Start\""[..]
        {
            self.headshots.clear();
        } else if self.reset_policy == ResetPolicy::Map && message.starts_with(b"Started map") {
            self.headshots.clear();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;
    use tokio::net::TcpListener;

    /// Client backed by a connection nobody answers on. Good enough for
    /// the counting paths, which never touch the wire.
    async fn idle_rcon() -> Arc<RconClient> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _connection = listener.accept().await;
            std::future::pending::<()>().await;
        });
        Arc::new(
            RconClient::connect(&addr.ip().to_string(), addr.port(), Duration::from_secs(1))
                .await
                .unwrap(),
        )
    }

    async fn make_plugin(reset_policy: ResetPolicy, count_bots: bool) -> HeadshotPlugin {
        HeadshotPlugin {
            rcon: idle_rcon().await,
            headshots: HashMap::new(),
            reset_policy,
            count_bots,
        }
    }

    fn event(message: &[u8]) -> LogEvent {
        LogEvent::Message {
            timestamp: NaiveDate::from_ymd_opt(2016, 11, 20)
                .unwrap()
                .and_hms_opt(13, 5, 40)
                .unwrap(),
            message: message.to_vec(),
        }
    }

    const HUMAN_KILL: &[u8] = b"\"Alice<2><[U:1:111]><CT>\" killed \"Bob<3><[U:1:222]><TERRORIST>\" with \"ak47\" (headshot)";
    const BOT_KILL: &[u8] = b"\"(BOT) Brad<4><BOT><CT>\" killed \"Bob<3><[U:1:222]><TERRORIST>\" with \"deagle\" (headshot)";

    #[tokio::test]
    async fn counts_headshots_per_player() {
        let mut plugin = make_plugin(ResetPolicy::Never, false).await;
        plugin.on_event(&event(HUMAN_KILL)).await.unwrap();
        plugin.on_event(&event(HUMAN_KILL)).await.unwrap();

        assert_eq!(plugin.headshots.get(&b"Alice"[..].to_vec()), Some(&2));
    }

    #[tokio::test]
    async fn ignores_bot_kills_unless_configured() {
        let mut plugin = make_plugin(ResetPolicy::Never, false).await;
        plugin.on_event(&event(BOT_KILL)).await.unwrap();
        assert!(plugin.headshots.is_empty());

        let mut plugin = make_plugin(ResetPolicy::Never, true).await;
        plugin.on_event(&event(BOT_KILL)).await.unwrap();
        assert_eq!(plugin.headshots.get(&b"(BOT) Brad"[..].to_vec()), Some(&1));
    }

    #[tokio::test]
    async fn round_start_resets_when_configured() {
        let mut plugin = make_plugin(ResetPolicy::Round, false).await;
        plugin.on_event(&event(HUMAN_KILL)).await.unwrap();
        plugin
            .on_event(&event(b"World triggered \"Round_Start\""))
            .await
            .unwrap();
        assert!(plugin.headshots.is_empty());
    }

    #[tokio::test]
    async fn map_change_resets_when_configured() {
        let mut plugin = make_plugin(ResetPolicy::Map, false).await;
        plugin.on_event(&event(HUMAN_KILL)).await.unwrap();
        plugin
            .on_event(&event(b"Started map \"de_dust2\""))
            .await
            .unwrap();
        assert!(plugin.headshots.is_empty());

        // With the policy off, counts survive a map change.
        let mut plugin = make_plugin(ResetPolicy::Never, false).await;
        plugin.on_event(&event(HUMAN_KILL)).await.unwrap();
        plugin
            .on_event(&event(b"Started map \"de_dust2\""))
            .await
            .unwrap();
        assert_eq!(plugin.headshots.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_is_a_no_op() {
        let mut plugin = make_plugin(ResetPolicy::Never, false).await;
        plugin.on_event(&LogEvent::Shutdown).await.unwrap();
    }

    #[test]
    fn rejects_invalid_options() {
        assert!(parse_reset_policy("sometimes").is_err());
        assert!(parse_count_bots("maybe").is_err());
        assert_eq!(parse_reset_policy("round").unwrap(), ResetPolicy::Round);
        assert!(!parse_count_bots("no").unwrap());
    }
}
