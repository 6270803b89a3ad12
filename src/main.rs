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

mod backend;
mod config;
mod connectivity;
mod context;
mod dispatcher;
mod loader;
mod page_view;
mod status;

use backend::Backend;
use clap::Parser;
use config::AppConfig;
use context::AppContext;
use log::{error, info, warn};
use page_view::PageView;
use status::{ModuleLoadState, PageSurface};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

const APP_TITLE: &str = "Beacon Desktop";

/// Connectivity monitor and one-shot module loader
#[derive(Parser, Debug)]
#[command(name = "beacon-desktop", version, about)]
struct Cli {
    /// Run without a window, echoing log entries to stdout
    #[arg(long)]
    headless: bool,

    /// Exit once module loading has finished (implies --headless)
    #[arg(long)]
    once: bool,

    /// Print the final page state as JSON
    #[arg(long, requires = "once")]
    json: bool,

    /// Fetch the module over HTTP relative to this URL
    #[arg(long, value_name = "URL", conflicts_with = "module_dir")]
    base_url: Option<String>,

    /// Read the module from this directory
    #[arg(long, value_name = "DIR")]
    module_dir: Option<PathBuf>,

    /// Module resource name
    #[arg(long, value_name = "NAME")]
    resource: Option<String>,

    /// Reachability probe target
    #[arg(long, value_name = "HOST:PORT")]
    probe_address: Option<String>,

    /// Print the configuration file path and exit
    #[arg(long)]
    config_path: bool,

    /// Persist the effective configuration before starting
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    /// Overlay command-line overrides on the loaded configuration
    fn apply(&self, config: &mut AppConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = Some(base_url.clone());
            config.module_dir = None;
        }
        if let Some(module_dir) = &self.module_dir {
            config.module_dir = Some(module_dir.clone());
            config.base_url = None;
        }
        if let Some(resource) = &self.resource {
            config.resource.clone_from(resource);
        }
        if let Some(probe_address) = &self.probe_address {
            config.probe_address.clone_from(probe_address);
        }
    }

    fn headless(&self) -> bool {
        self.headless || self.once
    }
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.config_path {
        println!("{}", AppConfig::get_config_path()?.display());
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config ({e}), using defaults");
            AppConfig::default()
        }
    };
    cli.apply(&mut config);

    if cli.save_config {
        config.save()?;
        if let Ok(path) = AppConfig::get_config_path() {
            info!("Saved configuration to {}", path.display());
        }
    }

    if cli.headless() {
        run_headless(&config, cli.once, cli.json)
    } else {
        run_window(&config)
    }
}

fn run_headless(config: &AppConfig, once: bool, json: bool) -> Result<ExitCode, Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // Keep stdout clean for the JSON document
    let ctx = AppContext::new(PageSurface::with_echo(!json));

    runtime
        .block_on(headless(ctx, config, once, json))
        .map_err(|e| -> Box<dyn Error> { e })
}

async fn headless(
    ctx: AppContext,
    config: &AppConfig,
    once: bool,
    json: bool,
) -> Result<ExitCode, Box<dyn Error + Send + Sync>> {
    let backend = Backend::start(ctx.clone(), config).await?;

    if !once {
        info!("Running headless, press Ctrl+C to exit");
        tokio::signal::ctrl_c().await?;
        info!("Shutting down");
        return Ok(ExitCode::SUCCESS);
    }

    let state = backend.wait_for_module().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&ctx.snapshot())?);
    }

    Ok(if state == ModuleLoadState::Failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_window(config: &AppConfig) -> Result<ExitCode, Box<dyn Error>> {
    let ctx = AppContext::new(PageSurface::new());
    let surface = ctx.surface();

    // The window owns the main thread; the backend gets its own runtime
    let backend_config = config.clone();
    std::thread::Builder::new()
        .name("beacon-backend".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to build backend runtime: {e}");
                    return;
                }
            };

            runtime.block_on(async move {
                match Backend::start(ctx, &backend_config).await {
                    Ok(_backend) => std::future::pending::<()>().await,
                    Err(e) => error!("Backend failed to start: {e}"),
                }
            });
        })?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_title(APP_TITLE),
        ..Default::default()
    };

    info!("Initializing window...");
    eframe::run_native(
        APP_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(PageView::new(surface)))),
    )?;

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_opens_window() {
        let cli = Cli::parse_from(["beacon-desktop"]);
        assert!(!cli.headless());
        assert!(!cli.json);
    }

    #[test]
    fn test_once_implies_headless() {
        let cli = Cli::parse_from(["beacon-desktop", "--once", "--json"]);
        assert!(cli.headless());
        assert!(cli.json);
    }

    #[test]
    fn test_json_requires_once() {
        assert!(Cli::try_parse_from(["beacon-desktop", "--json"]).is_err());
    }

    #[test]
    fn test_base_url_conflicts_with_module_dir() {
        let result = Cli::try_parse_from([
            "beacon-desktop",
            "--base-url",
            "http://localhost:8000/",
            "--module-dir",
            "/tmp",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = AppConfig {
            base_url: Some("http://example.invalid/".to_string()),
            ..AppConfig::default()
        };

        let cli = Cli::parse_from([
            "beacon-desktop",
            "--module-dir",
            "/srv/modules",
            "--resource",
            "other.wasm",
            "--probe-address",
            "127.0.0.1:80",
        ]);
        cli.apply(&mut config);

        assert_eq!(config.base_url, None);
        assert_eq!(config.module_dir, Some(PathBuf::from("/srv/modules")));
        assert_eq!(config.resource, "other.wasm");
        assert_eq!(config.probe_address, "127.0.0.1:80");
        assert_eq!(config.probe_interval_secs, 5);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut config = AppConfig::default();
        Cli::parse_from(["beacon-desktop"]).apply(&mut config);
        assert_eq!(config, AppConfig::default());
    }
}
