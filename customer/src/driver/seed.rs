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

//! Population of the database with sample customers.

use crate::driver::{Driver, DriverError, DriverResult};
use crate::model::EmailAddress;
use log::{info, warn};
use rand::Rng;
use rand::seq::IndexedRandom;

/// First names to pick from when generating sample customers.
const FIRST_NAMES: &[&str] =
    &["Alex", "Ana", "Chen", "Fatima", "James", "Kofi", "Maria", "Noah", "Priya", "Sven"];

/// Last names to pick from when generating sample customers.
const LAST_NAMES: &[&str] =
    &["Garcia", "Ivanova", "Kim", "Mensah", "Novak", "Okafor", "Rossi", "Smith", "Tanaka", "Weber"];

/// Minimum age of the generated sample customers.
const MIN_AGE: i32 = 18;

/// Maximum age of the generated sample customers.
const MAX_AGE: i32 = 60;

/// Generates the details of `count` random customers with distinct email addresses.
fn random_customers(count: usize) -> DriverResult<Vec<(String, EmailAddress, i32)>> {
    let mut rng = rand::rng();
    let tag = rng.random::<u32>();

    let mut customers = Vec::with_capacity(count);
    for i in 0..count {
        let first = FIRST_NAMES.choose(&mut rng).copied().unwrap_or("Customer");
        let last = LAST_NAMES.choose(&mut rng).copied().unwrap_or("Sample");
        let email = EmailAddress::new(format!(
            "{}.{}.{}.{}@example.com",
            first.to_lowercase(),
            last.to_lowercase(),
            tag,
            i
        ))?;
        let age = rng.random_range(MIN_AGE..=MAX_AGE);
        customers.push((format!("{} {}", first, last), email, age));
    }
    Ok(customers)
}

impl Driver {
    /// Registers `count` random customers and returns how many were actually added.
    ///
    /// Customers whose email address happens to be registered already are skipped.
    pub(crate) async fn seed_customers(self, count: usize) -> DriverResult<usize> {
        let mut added = 0;
        for (name, email, age) in random_customers(count)? {
            match self.clone().add_customer(name, email, age).await {
                Ok(_) => added += 1,
                Err(DriverError::AlreadyExists(e)) => warn!("Skipping sample customer: {}", e),
                Err(e) => return Err(e),
            }
        }
        info!("Seeded {} sample customers", added);
        Ok(added)
    }
}
