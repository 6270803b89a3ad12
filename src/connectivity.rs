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

//! Connectivity observer: mirrors the platform's online/offline flag into the
//! connection indicator and the page log.

use log::info;
use module_host::ConnectivityProbe;
use std::sync::Arc;

use crate::context::AppContext;
use crate::dispatcher::{Channel, Dispatcher};
use crate::status::{ConnectionState, Region};

/// Source of the binary connectivity flag. Reading it cannot fail.
pub trait ConnectivitySignal: Send + Sync {
    fn is_online(&self) -> bool;
}

impl ConnectivitySignal for ConnectivityProbe {
    fn is_online(&self) -> bool {
        ConnectivityProbe::is_online(self)
    }
}

/// Reports the connectivity flag on demand and on every transition
#[derive(Debug)]
pub struct ConnectivityObserver<S> {
    ctx: AppContext,
    signal: S,
}

impl<S: ConnectivitySignal + 'static> ConnectivityObserver<S> {
    pub fn new(ctx: AppContext, signal: S) -> Self {
        Self { ctx, signal }
    }

    /// Read the flag, update the indicator and append one log entry.
    ///
    /// Repeated calls always log, even when the state has not changed.
    pub fn check_and_report(&self) -> ConnectionState {
        let state = ConnectionState::from_flag(self.signal.is_online());

        self.ctx
            .set_indicator(Region::ConnectionStatus, state.as_str(), state.class());
        self.ctx.log(state.log_message());

        info!("Connectivity: {}", state.as_str());
        state
    }

    /// Re-run the check on every `online` and `offline` notification
    pub fn register(self: &Arc<Self>, dispatcher: &Dispatcher) {
        for channel in [Channel::Online, Channel::Offline] {
            let observer = Arc::clone(self);
            dispatcher.subscribe(channel, move || {
                observer.check_and_report();
            });
        }
    }

    /// Initial report followed by registration
    pub fn start(self: &Arc<Self>, dispatcher: &Dispatcher) -> ConnectionState {
        let state = self.check_and_report();
        self.register(dispatcher);
        state
    }
}
