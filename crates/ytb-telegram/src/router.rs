use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use ytb_core::{config::Config, poller::SourcePoller, registry::SourceRegistry};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub registry: Arc<SourceRegistry>,
    pub poller: SourcePoller,
}

/// Serve the operator until Ctrl-C.
pub async fn run_polling(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "bot connected"),
        Err(e) => warn!(error = %e, "get_me failed, continuing"),
    }
    info!(
        operator = state.cfg.operator_id.0,
        tracked = state.registry.list().len(),
        limit = state.registry.limit(),
        "front end ready"
    );

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
