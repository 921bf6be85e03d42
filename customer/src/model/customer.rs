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

//! The `Customer` data type and its companions.

use crate::model::EmailAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a customer, as assigned by the database on insertion.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub(crate) struct CustomerId(i64);

impl CustomerId {
    /// Creates a new identifier from its raw database representation.
    pub(crate) fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw database representation of the identifier.
    pub(crate) fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Representation of a customer record.
///
/// A customer without an `id` has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub(crate) struct Customer {
    /// Identifier of the customer, if already persisted.
    id: Option<CustomerId>,

    /// Full name of the customer.
    name: String,

    /// Email address of the customer, unique across all customers.
    email: EmailAddress,

    /// Age of the customer.
    age: i32,
}

impl Customer {
    /// Creates a new customer that has not been persisted yet.
    pub(crate) fn new<N: Into<String>>(name: N, email: EmailAddress, age: i32) -> Self {
        Self { id: None, name: name.into(), email, age }
    }

    /// Modifies a customer to attach the identifier assigned by the database.
    pub(crate) fn with_id(mut self, id: CustomerId) -> Self {
        self.id = Some(id);
        self
    }

    /// Modifies a customer to change its name.
    pub(crate) fn with_name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Modifies a customer to change its email address.
    pub(crate) fn with_email(mut self, email: EmailAddress) -> Self {
        self.email = email;
        self
    }

    /// Modifies a customer to change its age.
    pub(crate) fn with_age(mut self, age: i32) -> Self {
        self.age = age;
        self
    }

    /// Gets the customer's identifier, or `None` if it has not been persisted yet.
    pub(crate) fn id(&self) -> Option<CustomerId> {
        self.id
    }

    /// Gets the customer's name.
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Gets the customer's email address.
    pub(crate) fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Gets the customer's age.
    pub(crate) fn age(&self) -> i32 {
        self.age
    }
}

/// Set of changes to apply to an existing customer.  Fields set to `None` are left untouched.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[cfg_attr(test, derive(Clone, Serialize))]
pub(crate) struct CustomerPatch {
    /// New name for the customer.
    #[serde(default)]
    pub(crate) name: Option<String>,

    /// New email address for the customer.
    #[serde(default)]
    pub(crate) email: Option<EmailAddress>,

    /// New age for the customer.
    #[serde(default)]
    pub(crate) age: Option<i32>,
}
