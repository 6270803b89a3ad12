// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wires the platform pieces to the page: the reachability probe feeds the
//! dispatcher's `online`/`offline` channels, and `ready` starts the loader.

use log::{debug, info, warn};
use module_host::{ConnectivityProbe, SourceFetcher};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::connectivity::ConnectivityObserver;
use crate::context::AppContext;
use crate::dispatcher::{Channel, Dispatcher};
use crate::loader::ModuleLoader;
use crate::status::ModuleLoadState;

/// Page log entry written once the backend is wired, before `ready`
pub const STARTUP_MESSAGE: &str = "Beacon Desktop loaded successfully";

/// Running backend.
///
/// The dispatcher, observer and probe live as long as the transition stream
/// does, which is the lifetime of the runtime.
#[derive(Debug)]
pub struct Backend {
    loader: Arc<ModuleLoader<SourceFetcher>>,
}

impl Backend {
    /// Start probing, report the initial state, log startup, then fire `ready`.
    ///
    /// Must run inside a tokio runtime; the loader continues in a spawned task.
    pub async fn start(ctx: AppContext, config: &AppConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let fetcher = config.fetcher()?;
        info!("Module source: {fetcher} (resource '{}')", config.resource);

        let probe = ConnectivityProbe::start(config.probe_config()).await;
        let transitions = probe.transitions();

        let dispatcher = Arc::new(Dispatcher::new());

        let observer = Arc::new(ConnectivityObserver::new(ctx.clone(), probe));
        observer.start(&dispatcher);
        tokio::spawn(forward_transitions(transitions, Arc::clone(&dispatcher)));

        ctx.log(STARTUP_MESSAGE);

        let loader = Arc::new(ModuleLoader::new(ctx, fetcher, config.resource.clone()));
        loader.register(&dispatcher);

        dispatcher.emit(Channel::Ready);

        Ok(Self { loader })
    }

    /// Wait until the loader reaches `Loaded` or `Failed`
    pub async fn wait_for_module(&self) -> ModuleLoadState {
        let mut states = self.loader.subscribe();
        let state = match states.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_closed) => self.loader.state(),
        };
        state
    }
}

/// Emit `online`/`offline` for every change of the connectivity flag.
///
/// Rapid flips are delivered one by one, never merged.
pub async fn forward_transitions(mut transitions: broadcast::Receiver<bool>, dispatcher: Arc<Dispatcher>) {
    loop {
        match transitions.recv().await {
            Ok(online) => {
                dispatcher.emit(if online { Channel::Online } else { Channel::Offline });
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Dropped {skipped} connectivity transition(s)");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("Connectivity transitions closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PageSurface;
    use module_host::runtime::test_utils::ADD_WITH_LOG_WASM;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_forward_transitions_emits_per_change() {
        let (tx, rx) = broadcast::channel(16);
        let dispatcher = Arc::new(Dispatcher::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for channel in [Channel::Online, Channel::Offline] {
            let seen = Arc::clone(&seen);
            dispatcher.subscribe(channel, move || seen.lock().unwrap().push(channel));
        }

        let task = tokio::spawn(forward_transitions(rx, Arc::clone(&dispatcher)));

        tx.send(false).unwrap();
        tokio::task::yield_now().await;
        tx.send(true).unwrap();
        tokio::task::yield_now().await;
        drop(tx);
        task.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Channel::Offline, Channel::Online]);
    }

    #[tokio::test]
    async fn test_forward_transitions_keeps_rapid_flips() {
        let (tx, rx) = broadcast::channel(16);
        let dispatcher = Arc::new(Dispatcher::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for channel in [Channel::Online, Channel::Offline] {
            let seen = Arc::clone(&seen);
            dispatcher.subscribe(channel, move || seen.lock().unwrap().push(channel));
        }

        // Both flips land before the forwarder gets to run
        tx.send(false).unwrap();
        tx.send(true).unwrap();
        drop(tx);

        forward_transitions(rx, Arc::clone(&dispatcher)).await;

        assert_eq!(*seen.lock().unwrap(), vec![Channel::Offline, Channel::Online]);
    }

    #[tokio::test]
    async fn test_backend_loads_module_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("module.wasm"), ADD_WITH_LOG_WASM).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let config = AppConfig {
            module_dir: Some(dir.path().to_path_buf()),
            probe_address: listener.local_addr().unwrap().to_string(),
            probe_timeout_ms: 500,
            ..AppConfig::default()
        };

        let ctx = AppContext::new(PageSurface::new());
        let backend = Backend::start(ctx.clone(), &config).await.unwrap();

        let state = tokio::time::timeout(Duration::from_secs(10), backend.wait_for_module())
            .await
            .unwrap();
        assert_eq!(state, ModuleLoadState::Loaded);

        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.connection.text, "online");
        assert_eq!(snapshot.module.text, "Loaded");
        assert_eq!(snapshot.result.text, "module add function result: 42");

        let messages = ctx.log_messages();
        assert_eq!(
            messages[..4],
            [
                "Internet connection detected".to_string(),
                STARTUP_MESSAGE.to_string(),
                "Page fully loaded, starting module loading...".to_string(),
                "Starting module loading...".to_string(),
            ]
        );
        assert_eq!(
            messages.iter().filter(|m| *m == STARTUP_MESSAGE).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_backend_reports_missing_module() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            module_dir: Some(dir.path().to_path_buf()),
            probe_address: "127.0.0.1:9".to_string(),
            probe_timeout_ms: 200,
            ..AppConfig::default()
        };

        let ctx = AppContext::new(PageSurface::new());
        let backend = Backend::start(ctx.clone(), &config).await.unwrap();
        let state = tokio::time::timeout(Duration::from_secs(10), backend.wait_for_module())
            .await
            .unwrap();

        assert_eq!(state, ModuleLoadState::Failed);
        assert_eq!(
            ctx.snapshot().result.text,
            "Error: Failed to load module file: 404 Not Found"
        );
    }
}
