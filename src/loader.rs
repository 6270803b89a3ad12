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

//! One-shot module loader.
//!
//! Drives `idle -> loading -> (loaded | failed)` exactly once: fetch the
//! artifact, instantiate it, call `add(40, 2)` and report the outcome on the
//! page. Every failure ends in the same terminal effects; nothing is retried.

use log::{debug, error, info, warn};
use module_host::{Fetcher, ModuleHost, ModuleInstance, Numeric};
use std::sync::Arc;
use tokio::sync::watch;

use crate::context::AppContext;
use crate::dispatcher::{Channel, Dispatcher};
use crate::status::{ModuleLoadState, Region, StatusClass};

/// Resource fetched when nothing else is configured
pub const DEFAULT_RESOURCE: &str = "module.wasm";

/// Export invoked after instantiation
pub const ADD_EXPORT: &str = "add";

/// Fixed arguments for the `add` call
pub const ADD_ARGS: [Numeric; 2] = [Numeric::I32(40), Numeric::I32(2)];

/// A successfully loaded module and the result of the `add` call
#[derive(Debug)]
pub struct LoadedModule {
    pub instance: ModuleInstance,
    pub result: Numeric,
}

/// Exit paths of the load pipeline
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(LoadedModule),
    /// Transport failure or non-success status
    FetchFailed(String),
    /// Malformed or incompatible artifact
    InstantiateFailed(String),
    /// Anything else, e.g. a missing export or a trap
    Failed(String),
}

impl LoadOutcome {
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Loaded(_) => None,
            Self::FetchFailed(message) | Self::InstantiateFailed(message) | Self::Failed(message) => {
                Some(message)
            }
        }
    }
}

pub struct ModuleLoader<F> {
    ctx: AppContext,
    fetcher: F,
    host: ModuleHost,
    resource: String,
    state_tx: watch::Sender<ModuleLoadState>,
}

impl<F> std::fmt::Debug for ModuleLoader<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("resource", &self.resource)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl<F: Fetcher + 'static> ModuleLoader<F> {
    pub fn new(ctx: AppContext, fetcher: F, resource: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(ModuleLoadState::Idle);
        Self {
            ctx,
            fetcher,
            host: ModuleHost::new(),
            resource: resource.into(),
            state_tx,
        }
    }

    pub fn state(&self) -> ModuleLoadState {
        *self.state_tx.borrow()
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<ModuleLoadState> {
        self.state_tx.subscribe()
    }

    /// Idle -> Loading; false if loading has already been attempted
    fn begin(&self) -> bool {
        self.state_tx.send_if_modified(|state| {
            if *state == ModuleLoadState::Idle {
                *state = ModuleLoadState::Loading;
                true
            } else {
                false
            }
        })
    }

    fn finish(&self, terminal: ModuleLoadState) {
        debug_assert!(terminal.is_terminal());
        self.state_tx.send_replace(terminal);
    }

    /// Run the whole load sequence once.
    ///
    /// Returns the loaded module on success. Returns `None` on failure and on
    /// any call after the first, which does nothing at all.
    pub async fn load_and_run(&self) -> Option<LoadedModule> {
        if !self.begin() {
            warn!("Module loading already {}, ignoring request", self.state());
            return None;
        }

        self.ctx.log("Starting module loading...");
        self.ctx
            .set_indicator(Region::ModuleStatus, "Loading...", StatusClass::Loading);

        match self.run_pipeline().await {
            LoadOutcome::Loaded(loaded) => {
                self.finish(ModuleLoadState::Loaded);
                self.ctx
                    .set_indicator(Region::ModuleStatus, "Loaded", StatusClass::Online);
                self.ctx.set_text(
                    Region::Result,
                    format!("module add function result: {}", loaded.result),
                );
                self.ctx.log(format!(
                    "Called module add function with {} and {}, result: {}",
                    ADD_ARGS[0], ADD_ARGS[1], loaded.result
                ));
                info!("Module loaded, {ADD_EXPORT} returned {}", loaded.result);
                Some(loaded)
            }
            failure => {
                self.fail(failure.error_message().unwrap_or_default());
                None
            }
        }
    }

    async fn run_pipeline(&self) -> LoadOutcome {
        let response = match self.fetcher.fetch(&self.resource).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                return LoadOutcome::FetchFailed(format!(
                    "Failed to load module file: {} {}",
                    response.status, response.status_text
                ))
            }
            Err(e) => return LoadOutcome::FetchFailed(e.to_string()),
        };

        self.ctx.log("module file fetched, instantiating...");
        debug!("Fetched {} ({} bytes)", self.resource, response.body.len());

        let mut instance = match self.host.instantiate(response.body).await {
            Ok(instance) => instance,
            Err(e) => return LoadOutcome::InstantiateFailed(e.to_string()),
        };

        self.ctx.log("module instantiated successfully");

        match instance.call(ADD_EXPORT, &ADD_ARGS) {
            Ok(result) => LoadOutcome::Loaded(LoadedModule { instance, result }),
            Err(e) => LoadOutcome::Failed(e.to_string()),
        }
    }

    fn fail(&self, message: &str) {
        self.finish(ModuleLoadState::Failed);
        self.ctx.log(format!("Error loading module: {message}"));
        self.ctx
            .set_indicator(Region::ModuleStatus, "Failed to load", StatusClass::Offline);
        self.ctx.set_text(Region::Result, format!("Error: {message}"));
        error!("Error loading module: {message}");
    }

    /// Start loading when `ready` fires
    pub fn register(self: &Arc<Self>, dispatcher: &Dispatcher) {
        let loader = Arc::clone(self);
        dispatcher.subscribe(Channel::Ready, move || {
            loader.ctx.log("Page fully loaded, starting module loading...");
            let loader = Arc::clone(&loader);
            tokio::spawn(async move {
                if let Some(loaded) = loader.load_and_run().await {
                    debug!(
                        "Releasing module handle (exports: {:?})",
                        loaded.instance.exports()
                    );
                }
            });
        });
    }
}
