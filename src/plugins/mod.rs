//! Compiled-in bot plugins
//!
//! A plugin is initialized exactly once at startup - after RCON
//! authentication succeeds and before the log listener begins receiving -
//! with the shared RCON client, the event dispatcher, and the options from
//! its `[plugin.<name>]` config table. Initialization registers whatever
//! subscribers the plugin needs.

mod headshot;
mod log_file;

use std::sync::Arc;

use crate::config::PluginConfig;
use crate::dispatch::Dispatcher;
use crate::rcon::RconClient;

/// Initialize the named plugin
pub fn init_plugin(
    name: &str,
    rcon: &Arc<RconClient>,
    dispatcher: &mut Dispatcher,
    config: &PluginConfig,
) -> anyhow::Result<()> {
    match name {
        "log" => log_file::init(dispatcher, config),
        "headshot" => headshot::init(rcon, dispatcher, config),
        other => anyhow::bail!("unknown plugin '{}'", other),
    }
}
