use std::sync::Arc;

use tracing::{error, info};

use ytb_core::{
    config::{Config, FeedBackend},
    delivery::DeliveryPipeline,
    messaging::port::NotificationSink,
    poller::SourcePoller,
    ports::{FeedFetcher, MediaResolver},
    registry::SourceRegistry,
    store::SourceStore,
};
use ytb_feed::YoutubeFeedClient;
use ytb_telegram::{
    build_bot,
    router::{run_polling, AppState},
    TelegramSink,
};
use ytb_ytdlp::YtDlpClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ytb_core::logging::init("ytb")?;

    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!(kind = %e.kind(), error = %e, "refusing to start");
            return Err(e.into());
        }
    };
    info!(
        data_file = %cfg.data_file.display(),
        download_dir = %cfg.download_dir.display(),
        backend = ?cfg.feed_backend,
        ytdlp = %cfg.ytdlp_path.display(),
        "config loaded"
    );

    let store = Arc::new(SourceStore::new(&cfg.data_file));
    let ytdlp = Arc::new(YtDlpClient::from_config(&cfg));
    let fetcher: Arc<dyn FeedFetcher> = match cfg.feed_backend {
        FeedBackend::Rss => Arc::new(YoutubeFeedClient::from_config(&cfg)?),
        FeedBackend::YtDlp => ytdlp.clone(),
    };
    let resolver: Arc<dyn MediaResolver> = ytdlp;

    let bot = build_bot(&cfg)?;
    let sink: Arc<dyn NotificationSink> = Arc::new(TelegramSink::new(bot.clone()));

    let pipeline = Arc::new(DeliveryPipeline::new(cfg.clone(), resolver, sink));
    let poller = SourcePoller::new(cfg.clone(), store.clone(), fetcher.clone(), pipeline);
    let registry = Arc::new(SourceRegistry::new(cfg.clone(), store, fetcher));

    poller.start().await;

    let state = Arc::new(AppState {
        cfg,
        registry,
        poller: poller.clone(),
    });
    let served = run_polling(bot, state).await;

    poller.stop().await;
    served
}
