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

//! Operations on the collection of customers.

use crate::driver::{Driver, DriverError, DriverResult, EMAIL_TAKEN, map_email_conflict};
use crate::model::{Customer, EmailAddress};
use log::{info, warn};

impl Driver {
    /// Gets all registered customers.
    pub(crate) async fn get_all_customers(self) -> DriverResult<Vec<Customer>> {
        let customers = self.dao.select_all().await?;
        info!("Listing {} customers", customers.len());
        Ok(customers)
    }

    /// Registers a new customer and returns it with the identifier assigned by the database.
    ///
    /// Fails if another customer already uses `email`.
    pub(crate) async fn add_customer(
        self,
        name: String,
        email: EmailAddress,
        age: i32,
    ) -> DriverResult<Customer> {
        if self.dao.exists_by_email(&email).await? {
            warn!("Rejecting registration for {}: email already taken", email.as_str());
            return Err(DriverError::AlreadyExists(EMAIL_TAKEN.to_owned()));
        }

        let customer = Customer::new(name, email, age);
        let id = self.dao.insert(&customer).await.map_err(map_email_conflict)?;
        info!("Registered customer {}", id);
        Ok(customer.with_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DaoKind;
    use crate::driver::testutils::*;

    #[tokio::test]
    async fn test_get_all_customers_empty() {
        let context = TestContext::setup().await;

        assert!(context.driver().get_all_customers().await.unwrap().is_empty());

        context.teardown().await;
    }

    #[tokio::test]
    async fn test_get_all_customers_some() {
        let context = TestContext::setup().await;

        let a = context.insert("A", "a@x.com", 20).await;
        let b = context.insert("B", "b@x.com", 30).await;

        assert_eq!(vec![a, b], context.driver().get_all_customers().await.unwrap());

        context.teardown().await;
    }

    #[tokio::test]
    async fn test_add_customer_ok() {
        let context = TestContext::setup().await;

        let customer = context
            .driver()
            .add_customer("James".to_owned(), EmailAddress::from("james@email.com"), 21)
            .await
            .unwrap();
        let id = customer.id().unwrap();
        assert_eq!("James", customer.name());
        assert_eq!("james@email.com", customer.email().as_str());
        assert_eq!(21, customer.age());

        let all = context.driver().get_all_customers().await.unwrap();
        assert_eq!(vec![customer.clone()], all);
        assert_eq!(Some(customer), context.dao().select_by_id(id).await.unwrap());

        context.teardown().await;
    }

    #[tokio::test]
    async fn test_add_customer_many_then_get_each() {
        let context = TestContext::setup().await;

        let mut added = vec![];
        for (name, email, age) in
            [("A", "a@x.com", 20), ("B", "b@x.com", 30), ("C", "c@x.com", 40), ("D", "d@y.org", 18)]
        {
            let customer = context
                .driver()
                .add_customer(name.to_owned(), EmailAddress::from(email), age)
                .await
                .unwrap();
            added.push(customer);
        }

        for customer in added {
            let stored =
                context.driver().get_customer_by_id(customer.id().unwrap()).await.unwrap();
            assert_eq!(customer, stored);
        }

        context.teardown().await;
    }

    #[tokio::test]
    async fn test_add_customer_email_taken() {
        let context = TestContext::setup().await;

        context
            .driver()
            .add_customer("A".to_owned(), EmailAddress::from("a@x.com"), 20)
            .await
            .unwrap();
        context.recorder().take_calls().await;

        let err = context
            .driver()
            .add_customer("Other".to_owned(), EmailAddress::from("a@x.com"), 50)
            .await
            .unwrap_err();
        assert_eq!(DriverError::AlreadyExists("Email already taken".to_owned()), err);
        assert_eq!(vec!["exists_by_email"], context.recorder().take_calls().await);
        assert_eq!(1, context.dao().select_all().await.unwrap().len());

        context.teardown().await;
    }

    #[tokio::test]
    async fn test_add_customer_with_repository() {
        let context = TestContext::setup_with(DaoKind::Repository).await;

        let customer = context
            .driver()
            .add_customer("A".to_owned(), EmailAddress::from("a@x.com"), 20)
            .await
            .unwrap();
        assert_eq!(vec![customer], context.driver().get_all_customers().await.unwrap());

        let err = context
            .driver()
            .add_customer("B".to_owned(), EmailAddress::from("a@x.com"), 30)
            .await
            .unwrap_err();
        assert_eq!(DriverError::AlreadyExists("Email already taken".to_owned()), err);

        context.teardown().await;
    }
}
