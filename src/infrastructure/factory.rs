use crate::application::worker::{ForecastWorker, PipelineSettings};
use crate::config::Config;
use crate::domain::market::DataProvider;
use crate::domain::ports::{ArtifactStore, PriceHistorySource, RawFeedAdapter};
use crate::infrastructure::binance::{ArchiveFeedAdapter, BinanceHistorySource};
use crate::infrastructure::coingecko::{CoinGeckoFeedAdapter, CoinGeckoHistorySource};
use crate::infrastructure::persistence::FileArtifactStore;
use std::sync::Arc;
use tracing::info;

pub struct ServiceFactory;

impl ServiceFactory {
    /// Downloader and fragment adapter for the configured provider
    pub fn create_provider(config: &Config) -> (Arc<dyn PriceHistorySource>, Arc<dyn RawFeedAdapter>) {
        match config.provider.provider {
            DataProvider::Binance => {
                let source = BinanceHistorySource::builder()
                    .archive_url(config.provider.binance_archive_url.clone())
                    .api_url(config.provider.binance_api_url.clone())
                    .data_dir(config.binance_data_path())
                    .build();
                (
                    Arc::new(source),
                    Arc::new(ArchiveFeedAdapter::new(config.binance_data_path())),
                )
            }
            DataProvider::CoinGecko => (
                Arc::new(CoinGeckoHistorySource::new(
                    config.provider.coingecko_api_url.clone(),
                    config.provider.coingecko_api_key.clone(),
                    config.coingecko_data_path(),
                )),
                Arc::new(CoinGeckoFeedAdapter::new(config.coingecko_data_path())),
            ),
        }
    }

    pub fn create_worker(config: &Config) -> ForecastWorker {
        let settings = PipelineSettings::from_config(config);
        let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::from_config(config));
        let (source, adapter) = Self::create_provider(config);

        info!(
            "ServiceFactory: {} worker for {} ({} provider, {} buckets, {} feature columns)",
            settings.kind,
            settings.token,
            config.provider.provider,
            settings.timeframe,
            settings.layout.width()
        );
        ForecastWorker::new(settings, store, source, adapter)
    }
}
