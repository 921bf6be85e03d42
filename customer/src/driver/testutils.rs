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

//! Test utilities for the business layer.

use crate::db::{CustomerDao, DaoKind, Db, DbResult, init_schema, sqlite};
use crate::driver::Driver;
use crate::model::{Customer, CustomerId, EmailAddress};
use async_trait::async_trait;
use futures::lock::Mutex;
use std::sync::Arc;

/// A `CustomerDao` that forwards all calls to another DAO and records their names.
pub(crate) struct RecorderCustomerDao {
    /// The DAO that actually serves the calls.
    inner: Arc<dyn CustomerDao + Send + Sync>,

    /// Names of the operations invoked so far, in order.
    calls: Mutex<Vec<&'static str>>,
}

impl RecorderCustomerDao {
    /// Creates a new recorder that forwards calls to `inner`.
    fn new(inner: Arc<dyn CustomerDao + Send + Sync>) -> Self {
        Self { inner, calls: Mutex::new(vec![]) }
    }

    /// Records a call to the `op` operation.
    async fn record(&self, op: &'static str) {
        let mut calls = self.calls.lock().await;
        calls.push(op);
    }

    /// Returns the names of the operations invoked so far and clears the record.
    pub(crate) async fn take_calls(&self) -> Vec<&'static str> {
        let mut calls = self.calls.lock().await;
        std::mem::take(&mut *calls)
    }

    /// Expects that none of the recorded calls modified the database.
    pub(crate) async fn expect_no_writes(&self) {
        let calls = self.calls.lock().await;
        for call in calls.iter() {
            assert!(
                !["insert", "delete_by_id", "update"].contains(call),
                "Expected no writes but found a call to {}",
                call
            );
        }
    }
}

#[async_trait]
impl CustomerDao for RecorderCustomerDao {
    async fn select_all(&self) -> DbResult<Vec<Customer>> {
        self.record("select_all").await;
        self.inner.select_all().await
    }

    async fn select_by_id(&self, id: CustomerId) -> DbResult<Option<Customer>> {
        self.record("select_by_id").await;
        self.inner.select_by_id(id).await
    }

    async fn insert(&self, customer: &Customer) -> DbResult<CustomerId> {
        self.record("insert").await;
        self.inner.insert(customer).await
    }

    async fn exists_by_email(&self, email: &EmailAddress) -> DbResult<bool> {
        self.record("exists_by_email").await;
        self.inner.exists_by_email(email).await
    }

    async fn exists_by_id(&self, id: CustomerId) -> DbResult<bool> {
        self.record("exists_by_id").await;
        self.inner.exists_by_id(id).await
    }

    async fn delete_by_id(&self, id: CustomerId) -> DbResult<()> {
        self.record("delete_by_id").await;
        self.inner.delete_by_id(id).await
    }

    async fn update(&self, customer: &Customer) -> DbResult<()> {
        self.record("update").await;
        self.inner.update(customer).await
    }
}

/// State of a running driver test.
pub(crate) struct TestContext {
    /// The database backing the test.
    db: Arc<dyn Db + Send + Sync>,

    /// The DAO seen by the driver, which records all calls.
    recorder: Arc<RecorderCustomerDao>,

    /// The DAO to use for direct database access, bypassing the recorder.
    dao: Arc<dyn CustomerDao + Send + Sync>,

    /// The driver under test.
    driver: Driver,
}

impl TestContext {
    /// Initializes the driver against an in-memory database with the default data access layer.
    pub(crate) async fn setup() -> Self {
        Self::setup_with(DaoKind::default()).await
    }

    /// Initializes the driver against an in-memory database with the `kind` data access layer.
    pub(crate) async fn setup_with(kind: DaoKind) -> Self {
        let db: Arc<dyn Db + Send + Sync> = Arc::new(sqlite::testutils::setup().await);
        init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        let dao = kind.build(db.clone());
        let recorder = Arc::new(RecorderCustomerDao::new(dao.clone()));
        let driver = Driver::new(recorder.clone());
        Self { db, recorder, dao, driver }
    }

    /// Gets direct access to the database contents.
    pub(crate) fn dao(&self) -> &(dyn CustomerDao + Send + Sync) {
        self.dao.as_ref()
    }

    /// Gets the recorder of the calls issued by the driver.
    pub(crate) fn recorder(&self) -> &RecorderCustomerDao {
        &self.recorder
    }

    /// Gets a copy of the driver under test.
    pub(crate) fn driver(&self) -> Driver {
        self.driver.clone()
    }

    /// Inserts a customer directly into the database and returns it with its identifier.
    pub(crate) async fn insert(&self, name: &str, email: &str, age: i32) -> Customer {
        let customer = Customer::new(name, EmailAddress::from(email), age);
        let id = self.dao.insert(&customer).await.unwrap();
        customer.with_id(id)
    }

    /// Releases the database.
    pub(crate) async fn teardown(self) {
        self.db.close().await;
    }
}
