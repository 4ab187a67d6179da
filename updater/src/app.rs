//! Application context: everything a handler or job needs, built once at
//! startup and shared behind an `Arc`.
//!
//! Service manager and fetcher are generic so tests can inject recording
//! doubles; the synchronous ports are trait objects because the status
//! backend is chosen at runtime.

use std::sync::Arc;

use updater_common::Platform;

use crate::application::ports::{ArtifactFetcher, Clock, LocalFs, ServiceHost, StatusStore};
use crate::application::services::inflight::InFlight;
use crate::application::services::update::UpdateDeps;
use crate::domain::config::UpdaterConfig;
use crate::domain::layout::ArtifactLayout;
use crate::scheduler::Scheduler;

pub struct AppContext<H, F> {
    pub config: UpdaterConfig,
    pub host: H,
    pub fetcher: F,
    pub store: Box<dyn StatusStore>,
    pub fs: Box<dyn LocalFs>,
    pub clock: Box<dyn Clock>,
    pub scheduler: Scheduler,
    pub inflight: Arc<InFlight>,
    pub platform: Platform,
    pub agent: ArtifactLayout,
    pub messenger: ArtifactLayout,
}

impl<H: ServiceHost, F: ArtifactFetcher> AppContext<H, F> {
    #[must_use]
    pub fn new(
        config: UpdaterConfig,
        host: H,
        fetcher: F,
        store: Box<dyn StatusStore>,
        fs: Box<dyn LocalFs>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            agent: config.agent_layout(),
            messenger: config.messenger_layout(),
            config,
            host,
            fetcher,
            store,
            fs,
            clock,
            scheduler: Scheduler::new(),
            inflight: InFlight::new(),
            platform: Platform::current(),
        }
    }

    /// Override the platform used to pick messenger release files.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn update_deps(
        &self,
    ) -> UpdateDeps<'_, H, F, dyn StatusStore, dyn LocalFs, dyn Clock> {
        UpdateDeps {
            host: &self.host,
            fetcher: &self.fetcher,
            store: self.store.as_ref(),
            fs: self.fs.as_ref(),
            clock: self.clock.as_ref(),
        }
    }
}
