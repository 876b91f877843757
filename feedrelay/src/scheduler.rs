use chrono::Utc;
use common::{Config, ConfigError, FeedSource, WindowMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinError;
use tracing::{debug, error, info};

use crate::channels::resolve_all;
use crate::chat::ChatPlatform;
use crate::dispatch::{CycleReport, DispatchCycle};
use crate::error::{CycleError, Error};
use crate::filter::PollWindow;
use crate::ingestion::FeedFetcher;

/// Lifecycle of the relay process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Starting,
    Ready,
    Polling,
    Sleeping,
    ShuttingDown,
    Stopped,
}

/// Owns the process lifetime: connect, resolve channels once, then poll on a fixed interval.
///
/// Shutdown is signalled through a `Notify`; use `notify_one` so a signal sent while
/// a cycle is running is still observed at the next await point.
pub struct Scheduler {
    sources: Vec<FeedSource>,
    interval: Duration,
    window: PollWindow,
    fetcher: Arc<dyn FeedFetcher>,
    chat: Arc<dyn ChatPlatform>,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        sources: Vec<FeedSource>,
        interval: Duration,
        window: WindowMode,
        fetcher: Arc<dyn FeedFetcher>,
        chat: Arc<dyn ChatPlatform>,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Starting);
        Self {
            sources,
            interval,
            window: PollWindow::new(window, interval),
            fetcher,
            chat,
            state,
        }
    }

    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn FeedFetcher>,
        chat: Arc<dyn ChatPlatform>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.feed_sources()?,
            config.poll_interval()?,
            config.scheduler.window,
            fetcher,
            chat,
        ))
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: SchedulerState) {
        debug!(state = ?next, "scheduler state");
        self.state.send_replace(next);
    }

    fn stop(&self) {
        self.set_state(SchedulerState::ShuttingDown);
        info!("Shutdown background task");
        self.set_state(SchedulerState::Stopped);
    }

    /// Connect, then bind every topic to its channels.
    async fn start(&self) -> Result<Arc<DispatchCycle>, Error> {
        self.set_state(SchedulerState::Starting);
        let user = self.chat.connect().await?;
        info!("Logged in as {} (ID: {})", user.name, user.id);
        self.set_state(SchedulerState::Ready);

        let topics: Vec<String> = self.sources.iter().map(|s| s.topic.clone()).collect();
        let binding = resolve_all(self.chat.as_ref(), &topics).await?;
        info!("bound {} channel(s) for {} topic(s)", binding.len(), topics.len());

        Ok(Arc::new(DispatchCycle::new(
            self.sources.clone(),
            binding,
            self.fetcher.clone(),
            self.chat.clone(),
        )))
    }

    /// Run until `shutdown` is notified. Only startup failures are returned;
    /// a failed cycle is logged and retried at the next interval.
    pub async fn run(mut self, shutdown: Arc<Notify>) -> Result<(), Error> {
        let started = tokio::select! {
            res = self.start() => Some(res),
            _ = shutdown.notified() => None,
        };
        let cycle = match started {
            Some(Ok(cycle)) => cycle,
            Some(Err(e)) => {
                error!(%e, "startup failed");
                self.stop();
                return Err(e);
            }
            None => {
                info!("shutdown requested during startup");
                self.stop();
                return Ok(());
            }
        };

        info!(interval_secs = self.interval.as_secs(), "polling loop started");
        loop {
            self.set_state(SchedulerState::Polling);
            let window = self.window.next(Utc::now());

            let task = {
                let cycle = cycle.clone();
                tokio::spawn(async move { cycle.run(window).await })
            };
            let abort = task.abort_handle();

            tokio::select! {
                joined = task => {
                    if let Err(e) = flatten(joined) {
                        error!(%e, "Background task error");
                    }
                }
                _ = shutdown.notified() => {
                    abort.abort();
                    info!("shutdown requested during dispatch cycle");
                    break;
                }
            }

            self.set_state(SchedulerState::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.notified() => {
                    info!("shutdown requested while sleeping");
                    break;
                }
            }
        }

        self.stop();
        Ok(())
    }

    /// Startup plus exactly one dispatch cycle.
    pub async fn run_once(mut self) -> Result<CycleReport, Error> {
        let cycle = match self.start().await {
            Ok(cycle) => cycle,
            Err(e) => {
                self.stop();
                return Err(e);
            }
        };
        self.set_state(SchedulerState::Polling);
        let window = self.window.next(Utc::now());
        let result = cycle.run(window).await;
        self.stop();
        Ok(result?)
    }
}

fn flatten(joined: Result<Result<CycleReport, CycleError>, JoinError>) -> Result<CycleReport, CycleError> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(CycleError::Panicked(e.to_string())),
    }
}
