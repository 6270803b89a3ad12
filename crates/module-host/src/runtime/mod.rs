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

//! Runtime layer: compiles module artifacts with `wasmtime`, links the host
//! `env.log` import and calls numeric exports.

mod numeric;

pub use numeric::{is_numeric, type_name, Numeric};

use std::fmt;

use log::{debug, info};
use thiserror::Error;
use wasmtime::{Caller, Engine, ExternType, FuncType, Instance, Linker, Module, Store, Val, ValType};

/// Import module name the host functions live under.
pub const HOST_MODULE: &str = "env";

/// Name of the diagnostic logging import.
pub const LOG_IMPORT: &str = "log";

/// Errors raised while turning an artifact into a running instance.
#[derive(Debug, Error)]
pub enum InstantiateError {
    #[error("{0}")]
    Compile(String),

    #[error("{0}")]
    Link(String),

    #[error("instantiation worker failed: {0}")]
    Worker(String),
}

/// Errors raised while calling an export of a running instance.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("module does not export a function named '{0}'")]
    MissingExport(String),

    #[error("export '{name}' cannot be called: {reason}")]
    Signature { name: String, reason: String },

    #[error("{0}")]
    Trap(String),
}

/// Per-instance host state.
#[derive(Debug, Default)]
pub struct HostState {
    logged: Vec<Numeric>,
}

/// Compiles and instantiates modules against the host imports.
#[derive(Clone, Default)]
pub struct ModuleHost {
    engine: Engine,
}

impl fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHost").finish_non_exhaustive()
    }
}

impl ModuleHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `bytes` on a blocking worker, then link and instantiate it.
    pub async fn instantiate(&self, bytes: Vec<u8>) -> Result<ModuleInstance, InstantiateError> {
        let engine = self.engine.clone();
        let module = tokio::task::spawn_blocking(move || Module::new(&engine, &bytes))
            .await
            .map_err(|e| InstantiateError::Worker(e.to_string()))?
            .map_err(|e| InstantiateError::Compile(format!("{e:#}")))?;

        self.link(&module)
    }

    /// Link the host imports and instantiate an already compiled module.
    pub fn link(&self, module: &Module) -> Result<ModuleInstance, InstantiateError> {
        let mut linker = Linker::new(&self.engine);

        // Only define `env.log` when the module asks for a shape we can serve;
        // anything else surfaces as an unknown-import link error.
        if let Some(ty) = log_import_type(module) {
            debug!("Linking {HOST_MODULE}.{LOG_IMPORT}");
            linker
                .func_new(HOST_MODULE, LOG_IMPORT, ty, host_log)
                .map_err(|e| InstantiateError::Link(format!("{e:#}")))?;
        }

        let mut store = Store::new(&self.engine, HostState::default());
        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| InstantiateError::Link(format!("{e:#}")))?;

        info!("Instantiated module with {} export(s)", module.exports().len());

        Ok(ModuleInstance {
            store,
            instance,
            module: module.clone(),
        })
    }
}

fn log_import_type(module: &Module) -> Option<FuncType> {
    let import = module
        .imports()
        .find(|import| import.module() == HOST_MODULE && import.name() == LOG_IMPORT)?;

    match import.ty() {
        ExternType::Func(ty) if is_log_signature(&ty) => Some(ty),
        _ => None,
    }
}

fn is_log_signature(ty: &FuncType) -> bool {
    let mut params = ty.params();
    let single_numeric = matches!((params.next(), params.next()), (Some(p), None) if is_numeric(&p));
    single_numeric && ty.results().next().is_none()
}

#[allow(clippy::unnecessary_wraps, reason = "signature required by Linker::func_new")]
fn host_log(mut caller: Caller<'_, HostState>, params: &[Val], _results: &mut [Val]) -> wasmtime::Result<()> {
    if let Some(value) = params.first().and_then(Numeric::from_val) {
        info!(target: "module", "module log: {value}");
        caller.data_mut().logged.push(value);
    }
    Ok(())
}

/// A running module instance with its own store.
pub struct ModuleInstance {
    store: Store<HostState>,
    instance: Instance,
    module: Module,
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("exports", &self.exports())
            .field("logged", &self.logged_values())
            .finish_non_exhaustive()
    }
}

impl ModuleInstance {
    /// Names of the exported functions.
    #[must_use]
    pub fn exports(&self) -> Vec<String> {
        self.module
            .exports()
            .filter(|export| matches!(export.ty(), ExternType::Func(_)))
            .map(|export| export.name().to_string())
            .collect()
    }

    /// Values the module passed to `env.log`, in call order.
    #[must_use]
    pub fn logged_values(&self) -> &[Numeric] {
        &self.store.data().logged
    }

    /// Call a numeric export with numeric arguments.
    ///
    /// Arguments are coerced to the export's parameter types; the export must
    /// return exactly one numeric value.
    pub fn call(&mut self, name: &str, args: &[Numeric]) -> Result<Numeric, InvokeError> {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| InvokeError::MissingExport(name.to_string()))?;

        let ty = func.ty(&self.store);
        let signature_error = |reason: String| InvokeError::Signature {
            name: name.to_string(),
            reason,
        };

        let param_types: Vec<ValType> = ty.params().collect();
        if param_types.len() != args.len() {
            return Err(signature_error(format!(
                "expected {} argument(s), got {}",
                param_types.len(),
                args.len()
            )));
        }

        let params = args
            .iter()
            .zip(&param_types)
            .map(|(arg, param)| {
                arg.to_val(param)
                    .ok_or_else(|| signature_error(format!("cannot pass {arg} as {}", type_name(param))))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let result_types: Vec<ValType> = ty.results().collect();
        match result_types.as_slice() {
            [result] if is_numeric(result) => {}
            [result] => {
                return Err(signature_error(format!(
                    "result type {} is not numeric",
                    type_name(result)
                )))
            }
            other => {
                return Err(signature_error(format!(
                    "expected one result, found {}",
                    other.len()
                )))
            }
        }

        let mut results = vec![Val::I32(0)];
        func.call(&mut self.store, &params, &mut results)
            .map_err(|e| InvokeError::Trap(format!("{e:#}")))?;

        debug!("{name}({}) returned", args.len());
        results
            .first()
            .and_then(Numeric::from_val)
            .ok_or_else(|| signature_error("export returned a non-numeric value".to_string()))
    }
}

#[cfg(any(test, feature = "test"))]
pub mod test_utils;
