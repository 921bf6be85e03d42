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

//! API to register a new customer.

use crate::driver::Driver;
use crate::model::EmailAddress;
use crate::rest::RestResult;
use axum::Json;
use axum::extract::State;
use serde::Deserialize;

/// Message sent to the server to register a new customer.
#[derive(Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct CustomerRegistrationRequest {
    /// Full name of the new customer.
    name: String,

    /// Email address of the new customer.
    email: EmailAddress,

    /// Age of the new customer.
    age: i32,
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Json(request): Json<CustomerRegistrationRequest>,
) -> RestResult<()> {
    driver.add_customer(request.name, request.email, request.age).await?;
    Ok(())
}
