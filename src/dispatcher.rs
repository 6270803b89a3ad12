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

//! Named-channel event dispatcher.
//!
//! Stands in for the platform's event registration: components subscribe
//! zero-argument handlers to `online`, `offline` or `ready`, and the platform
//! glue emits those channels as things happen.

use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Notification channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Connectivity became available
    Online,
    /// Connectivity was lost
    Offline,
    /// Startup finished
    Ready,
}

impl Channel {
    pub fn name(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown channel '{0}'")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "ready" => Ok(Self::Ready),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}

pub type Handler = Arc<dyn Fn() + Send + Sync>;

/// Registry of handlers per channel
#[derive(Default)]
pub struct Dispatcher {
    handlers: Mutex<HashMap<Channel, Vec<Handler>>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<Channel, usize> = handlers.iter().map(|(c, h)| (*c, h.len())).collect();
        f.debug_struct("Dispatcher").field("handlers", &counts).finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; handlers run in subscription order
    pub fn subscribe(&self, channel: Channel, handler: impl Fn() + Send + Sync + 'static) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Run every handler of `channel` and return how many ran.
    ///
    /// The handler list is copied first so handlers may subscribe or emit
    /// without deadlocking.
    pub fn emit(&self, channel: Channel) -> usize {
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .cloned()
            .unwrap_or_default();

        debug!("Dispatching '{}' to {} handler(s)", channel, handlers.len());
        for handler in &handlers {
            handler();
        }
        handlers.len()
    }

    #[cfg(test)]
    pub fn handler_count(&self, channel: Channel) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let dispatcher = Dispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = Arc::clone(&order);
            dispatcher.subscribe(Channel::Online, move || order.lock().unwrap().push(id));
        }

        assert_eq!(dispatcher.emit(Channel::Online), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_channels_are_isolated() {
        let dispatcher = Dispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        dispatcher.subscribe(Channel::Offline, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(dispatcher.emit(Channel::Online), 0);
        assert_eq!(dispatcher.emit(Channel::Ready), 0);
        assert_eq!(dispatcher.emit(Channel::Offline), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_every_emit_runs_handlers() {
        let dispatcher = Dispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        dispatcher.subscribe(Channel::Online, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..5 {
            dispatcher.emit(Channel::Online);
        }
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_handler_may_subscribe_during_emit() {
        let dispatcher = Arc::new(Dispatcher::new());
        let inner = Arc::clone(&dispatcher);
        dispatcher.subscribe(Channel::Ready, move || inner.subscribe(Channel::Online, || {}));

        assert_eq!(dispatcher.emit(Channel::Ready), 1);
        assert_eq!(dispatcher.handler_count(Channel::Online), 1);
    }

    #[test]
    fn test_emit_by_name() {
        let dispatcher = Dispatcher::new();
        dispatcher.subscribe(Channel::Ready, || {});

        let channel = "ready".parse::<Channel>().unwrap();
        assert_eq!(dispatcher.emit(channel), 1);
        assert_eq!(
            "loaded".parse::<Channel>(),
            Err(UnknownChannel("loaded".to_string()))
        );
        assert_eq!(
            UnknownChannel("loaded".to_string()).to_string(),
            "unknown channel 'loaded'"
        );
        assert_eq!("offline".parse::<Channel>(), Ok(Channel::Offline));
        assert_eq!(Channel::Online.to_string(), "online");
    }
}
