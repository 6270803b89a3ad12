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

//! Explicit application context shared by the connectivity observer and the
//! module loader.

use std::sync::{Arc, Mutex, PoisonError};

use crate::status::{PageSurface, Region, SharedSurface, StatusClass};

/// Handle to the display surface and its log sink.
///
/// Cloning is cheap; all clones address the same surface. The lock is only
/// held for the duration of a single mutation, never across an await.
#[derive(Debug, Clone)]
pub struct AppContext {
    surface: SharedSurface,
}

impl AppContext {
    pub fn new(surface: PageSurface) -> Self {
        Self {
            surface: Arc::new(Mutex::new(surface)),
        }
    }

    /// Shared surface for read-only consumers such as the window
    pub fn surface(&self) -> SharedSurface {
        Arc::clone(&self.surface)
    }

    fn with_surface<R>(&self, f: impl FnOnce(&mut PageSurface) -> R) -> R {
        let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut surface)
    }

    /// Append a timestamped entry to the page log
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        self.with_surface(|surface| surface.append_log(message));
    }

    pub fn set_text(&self, region: Region, text: impl Into<String>) {
        let text = text.into();
        self.with_surface(|surface| surface.set_text(region, text));
    }

    /// Set text and class together under one lock
    pub fn set_indicator(&self, region: Region, text: impl Into<String>, class: StatusClass) {
        let text = text.into();
        self.with_surface(|surface| {
            surface.set_text(region, text);
            surface.set_class(region, class);
        });
    }

    /// Copy of the current surface state
    pub fn snapshot(&self) -> PageSurface {
        self.with_surface(|surface| surface.clone())
    }

    /// Messages currently in the log, oldest first
    #[cfg(test)]
    pub fn log_messages(&self) -> Vec<String> {
        self.with_surface(|surface| {
            surface
                .log_entries()
                .iter()
                .map(|entry| entry.message.clone())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_surface() {
        let ctx = AppContext::new(PageSurface::new());
        let other = ctx.clone();

        other.log("from clone");
        other.set_indicator(Region::Result, "Error: boom", StatusClass::Offline);

        assert_eq!(ctx.log_messages(), vec!["from clone".to_string()]);
        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.result.text, "Error: boom");
        assert_eq!(snapshot.result.class, StatusClass::Offline);
    }

    #[test]
    fn test_set_text_keeps_class() {
        let ctx = AppContext::new(PageSurface::new());
        ctx.set_indicator(Region::ModuleStatus, "Loading...", StatusClass::Loading);
        ctx.set_text(Region::ModuleStatus, "Loaded");

        let surface = ctx.surface();
        let surface = surface.lock().unwrap();
        assert_eq!(surface.module.text, "Loaded");
        assert_eq!(surface.module.class, StatusClass::Loading);
    }
}
