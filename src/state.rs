use std::sync::Arc;

use crate::backend::BackendClient;
use crate::config::{Args, CompletionsMode};
use crate::download::{DownloadCoordinator, HfFetcher, ShimmyReload};
use crate::translate::Translator;

// app's shared state
pub struct AppState {
    pub backend: BackendClient,
    pub translator: Translator,
    pub completions_mode: CompletionsMode,
    pub downloads: Arc<DownloadCoordinator>, // the one download slot
}

impl AppState {
    /// Wire the production components from CLI arguments.
    pub fn from_args(args: &Args) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().pool_max_idle_per_host(10).build()?;

        let backend = BackendClient::new(
            client,
            args.backend_base_url(),
            args.probe_timeout(),
            args.generate_timeout(),
        );
        let fetcher = HfFetcher::new(
            HfFetcher::client(args.hub_connect_timeout(), args.hub_read_timeout())?,
            args.hf_endpoint.clone(),
            args.hf_token.clone(),
        );
        let reload = ShimmyReload::new(args.backend_bin.clone(), args.serve_pattern.clone());
        let downloads = DownloadCoordinator::new(
            args.models_dir.clone(),
            Arc::new(fetcher),
            Arc::new(reload),
        );

        Ok(Self {
            backend,
            translator: Translator::new(args.default_model.clone()),
            completions_mode: args.completions_mode,
            downloads: Arc::new(downloads),
        })
    }
}
