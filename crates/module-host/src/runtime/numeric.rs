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

use std::fmt;

use wasmtime::{Val, ValType};

/// A number crossing the host/module boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Numeric {
    /// Read a numeric value out of a wasm value. Reference types yield `None`.
    #[must_use]
    pub fn from_val(val: &Val) -> Option<Self> {
        match val {
            Val::I32(v) => Some(Self::I32(*v)),
            Val::I64(v) => Some(Self::I64(*v)),
            Val::F32(bits) => Some(Self::F32(f32::from_bits(*bits))),
            Val::F64(bits) => Some(Self::F64(f64::from_bits(*bits))),
            _ => None,
        }
    }

    /// Convert to a wasm value of type `ty`.
    ///
    /// Integers convert to floats freely. Floats convert to integers only when
    /// they hold an integral value that fits the target.
    #[must_use]
    pub fn to_val(self, ty: &ValType) -> Option<Val> {
        match ty {
            ValType::I32 => self
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Val::I32),
            ValType::I64 => self.as_i64().map(Val::I64),
            #[allow(clippy::cast_possible_truncation, reason = "f32 parameters take the nearest f32")]
            ValType::F32 => Some(Val::F32(match self {
                Self::F32(v) => v.to_bits(),
                other => (other.as_f64() as f32).to_bits(),
            })),
            ValType::F64 => Some(Val::F64(self.as_f64().to_bits())),
            _ => None,
        }
    }

    fn as_i64(self) -> Option<i64> {
        match self {
            Self::I32(v) => Some(i64::from(v)),
            Self::I64(v) => Some(v),
            Self::F32(v) => integral_f64_to_i64(f64::from(v)),
            Self::F64(v) => integral_f64_to_i64(v),
        }
    }

    #[allow(clippy::cast_precision_loss, reason = "mirrors wasm's f64.convert_i64_s")]
    fn as_f64(self) -> f64 {
        match self {
            Self::I32(v) => f64::from(v),
            Self::I64(v) => v as f64,
            Self::F32(v) => f64::from(v),
            Self::F64(v) => v,
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "range and integrality are checked before the cast"
)]
fn integral_f64_to_i64(v: f64) -> Option<i64> {
    let in_range = v >= i64::MIN as f64 && v < i64::MAX as f64;
    (v.fract() == 0.0 && in_range).then(|| v as i64)
}

/// Whether `ty` can be represented as a [`Numeric`].
#[must_use]
pub fn is_numeric(ty: &ValType) -> bool {
    matches!(ty, ValType::I32 | ValType::I64 | ValType::F32 | ValType::F64)
}

/// Short wasm text name for a value type.
#[must_use]
pub fn type_name(ty: &ValType) -> &'static str {
    match ty {
        ValType::I32 => "i32",
        ValType::I64 => "i64",
        ValType::F32 => "f32",
        ValType::F64 => "f64",
        ValType::V128 => "v128",
        _ => "ref",
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_infinite() {
        f.write_str(if v > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        write!(f, "{v}")
    }
}

// Integral floats print without a fractional part ("42", not "42.0").
impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write_float(f, f64::from(*v)),
            Self::F64(v) => write_float(f, *v),
        }
    }
}
