// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Typed access to the environment variables that configure the service.
//!
//! Every setting lives in a variable named `<prefix>_<suffix>`, such as `CUSTOMER_PORT`, so that
//! several groups of settings (e.g. production and test databases) can coexist.

use std::env;

/// Raw value of an environment variable, pending conversion to its target type.
pub struct Value(String);

impl TryFrom<Value> for String {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(value.0)
    }
}

/// Implements `TryFrom<Value>` for integer types via their `FromStr` implementation.
macro_rules! parse_value_as [
    ( $( $t:ty ),+ ) => {
        $(
            impl TryFrom<Value> for $t {
                type Error = String;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    let raw = value.0;
                    raw.parse::<$t>()
                        .map_err(|e| format!("'{}' is not a valid {}: {}", raw, stringify!($t), e))
                }
            }
        )+
    }
];

parse_value_as!(u16, u32, usize);

/// Reads `<prefix>_<suffix>` and converts it to `T`, returning `None` when it is not set.
fn lookup<T>(prefix: &str, suffix: &str) -> Result<Option<T>, String>
where
    T: TryFrom<Value, Error = String>,
{
    let name = format!("{}_{}", prefix, suffix);
    let raw = match env::var(&name) {
        Ok(raw) => raw,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(env::VarError::NotUnicode(_)) => {
            return Err(format!("Environment variable {} is not valid UTF-8", name));
        }
    };
    T::try_from(Value(raw)).map(Some).map_err(|e| format!("Bad value in {}: {}", name, e))
}

/// Reads `<prefix>_<suffix>` and converts it to `T`, failing if it is not set.
pub fn get_required_var<T>(prefix: &str, suffix: &str) -> Result<T, String>
where
    T: TryFrom<Value, Error = String>,
{
    lookup(prefix, suffix)?.ok_or_else(|| {
        format!("Required environment variable {}_{} not present", prefix, suffix)
    })
}

/// Reads `<prefix>_<suffix>` and converts it to `T`, returning `None` when it is not set.
pub fn get_optional_var<T>(prefix: &str, suffix: &str) -> Result<Option<T>, String>
where
    T: TryFrom<Value, Error = String>,
{
    lookup(prefix, suffix)
}
