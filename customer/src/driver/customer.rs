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

//! Operations on one customer.

use crate::db::DbError;
use crate::driver::{Driver, DriverError, DriverResult, EMAIL_TAKEN, map_email_conflict};
use crate::model::{Customer, CustomerId, CustomerPatch};
use log::{debug, info, warn};

/// Constructs the error returned when the customer `id` is missing.
fn customer_not_found(id: CustomerId) -> DriverError {
    DriverError::NotFound(format!("Customer {} does not exist", id))
}

impl Driver {
    /// Fetches the customer identified by `id`, failing if it does not exist.
    async fn require_customer(&self, id: CustomerId) -> DriverResult<Customer> {
        match self.dao.select_by_id(id).await? {
            Some(customer) => Ok(customer),
            None => {
                warn!("Customer {} does not exist", id);
                Err(customer_not_found(id))
            }
        }
    }

    /// Gets the customer identified by `id`.
    pub(crate) async fn get_customer_by_id(self, id: CustomerId) -> DriverResult<Customer> {
        debug!("Looking up customer {}", id);
        self.require_customer(id).await
    }

    /// Deletes the customer identified by `id`.
    pub(crate) async fn delete_customer(self, id: CustomerId) -> DriverResult<()> {
        if !self.dao.exists_by_id(id).await? {
            warn!("Cannot delete customer {}: does not exist", id);
            return Err(customer_not_found(id));
        }

        self.dao.delete_by_id(id).await?;
        info!("Deleted customer {}", id);
        Ok(())
    }

    /// Applies the changes in `patch` to the customer identified by `id` and returns the updated
    /// customer.
    ///
    /// Only the fields that differ from the stored values are considered changes.  If there are
    /// no changes, the database is not touched.
    pub(crate) async fn update_customer(
        self,
        id: CustomerId,
        patch: CustomerPatch,
    ) -> DriverResult<Customer> {
        let current = self.require_customer(id).await?;

        let mut updated = current.clone();
        if let Some(name) = patch.name.filter(|name| name != updated.name()) {
            updated = updated.with_name(name);
        }
        if let Some(email) = patch.email.filter(|email| email != updated.email()) {
            if self.dao.exists_by_email(&email).await? {
                warn!("Cannot update customer {}: email already taken", id);
                return Err(DriverError::AlreadyExists(EMAIL_TAKEN.to_owned()));
            }
            updated = updated.with_email(email);
        }
        if let Some(age) = patch.age.filter(|age| *age != updated.age()) {
            updated = updated.with_age(age);
        }

        if updated == current {
            warn!("No changes detected for customer {}", id);
            return Ok(current);
        }

        self.dao.update(&updated).await.map_err(|e| match e {
            DbError::NotFound => customer_not_found(id),
            e => map_email_conflict(e),
        })?;
        info!("Updated customer {}", id);
        Ok(updated)
    }
}
