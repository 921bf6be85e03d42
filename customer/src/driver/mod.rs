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

//! Business logic for the service.
//!
//! Every operation implemented in the `Driver` consumes `self`.  Operations are a short sequence
//! of data access calls and callers should not be tempted to chain multiple operations on the same
//! driver instance: doing so would require a clone and highlight an undesirable pattern.

use crate::db::{CustomerDao, DbError};
use crate::model::ModelError;
use std::sync::Arc;

mod customer;
mod customers;
mod seed;
#[cfg(test)]
pub(crate) mod testutils;

/// Message returned when trying to register an email address that already belongs to a customer.
const EMAIL_TAKEN: &str = "Email already taken";

/// Business logic errors.  These errors encompass backend and logical errors.
#[derive(Debug, PartialEq, thiserror::Error)]
pub(crate) enum DriverError {
    /// The customer conflicts with a stored one.
    #[error("{0}")]
    AlreadyExists(String),

    /// The store failed in a way the caller cannot fix.
    #[error("{0}")]
    BackendError(String),

    /// The caller supplied a value that is not acceptable.
    #[error("{0}")]
    InvalidInput(String),

    /// The requested customer is not stored.
    #[error("{0}")]
    NotFound(String),
}

impl From<DbError> for DriverError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::AlreadyExists => DriverError::AlreadyExists(e.to_string()),
            DbError::BackendError(_) => DriverError::BackendError(e.to_string()),
            DbError::DataIntegrityError(_) => DriverError::BackendError(e.to_string()),
            DbError::NotFound => DriverError::NotFound(e.to_string()),
            DbError::Unavailable => DriverError::BackendError(e.to_string()),
        }
    }
}

impl From<ModelError> for DriverError {
    fn from(e: ModelError) -> Self {
        DriverError::InvalidInput(e.to_string())
    }
}

/// Result type for this module.
pub(crate) type DriverResult<T> = Result<T, DriverError>;

/// Converts an error from a write that may have hit the uniqueness constraint on emails.
///
/// Concurrent registrations can both pass the existence check, in which case the database
/// rejects the loser.  The caller must see the same error as if the check had caught it.
fn map_email_conflict(e: DbError) -> DriverError {
    match e {
        DbError::AlreadyExists => DriverError::AlreadyExists(EMAIL_TAKEN.to_owned()),
        e => e.into(),
    }
}

/// Business logic.
#[derive(Clone)]
pub(crate) struct Driver {
    /// The data access implementation that the driver uses for persistence.
    dao: Arc<dyn CustomerDao + Send + Sync>,
}

impl Driver {
    /// Creates a driver that persists customers through `dao`.
    pub(crate) fn new(dao: Arc<dyn CustomerDao + Send + Sync>) -> Self {
        Self { dao }
    }
}
