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

//! Host-side plumbing for loading and running a single WebAssembly module.
//!
//! The crate is split into three layers that the application wires together:
//!
//! - **Fetch layer**: retrieves the module artifact over HTTP or from a local
//!   directory, reporting HTTP-style status for both
//! - **Runtime layer**: compiles and instantiates the artifact with `wasmtime`,
//!   provides the `env.log` host import and calls numeric exports
//! - **Probe layer**: a TCP reachability probe that publishes an online/offline
//!   flag through a watch channel
//!
//! # Quick Start
//!
//! ```no_run
//! use module_host::{FileFetcher, Fetcher, ModuleHost, Numeric};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = FileFetcher::new(".");
//! let response = fetcher.fetch("module.wasm").await?;
//! if response.is_success() {
//!     let host = ModuleHost::new();
//!     let mut instance = host.instantiate(response.body).await?;
//!     let sum = instance.call("add", &[Numeric::I32(40), Numeric::I32(2)])?;
//!     println!("add returned {sum}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod fetch;
pub mod probe;
pub mod runtime;

pub use fetch::{FetchError, FetchResponse, Fetcher, FileFetcher, HttpFetcher, SourceFetcher};
pub use probe::{ConnectivityProbe, ProbeConfig};
pub use runtime::{InstantiateError, InvokeError, ModuleHost, ModuleInstance, Numeric};
