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

//! Database abstraction in terms of the operations needed by the service.
//!
//! Customers are persisted in a single `customer` table.  PostgreSQL is the production backend
//! and SQLite serves tests and lightweight deployments.  On top of the raw connections, this
//! module defines the `CustomerDao` contract, which has two interchangeable implementations:
//! `SqlCustomerDao` issues hand-written queries and `RepositoryCustomerDao` delegates to a
//! generic `EntityRepository`.

use crate::env::{Value, get_optional_var};
use crate::model::{Customer, CustomerId, EmailAddress, ModelError};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgRow, Postgres};
use sqlx::sqlite::{Sqlite, SqliteRow};
use std::fmt;
use std::sync::Arc;

pub mod postgres;
mod repository;
use repository::RepositoryCustomerDao;
mod sql;
use sql::SqlCustomerDao;
pub mod sqlite;

/// Database errors.  Any unexpected errors that come from the database are classified as
/// `BackendError`, but errors we know about have more specific types.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DbError {
    /// A row with the same unique key (the email) is already stored.
    #[error("Already exists")]
    AlreadyExists,

    /// Any other failure reported by the database.
    #[error("Database error: {0}")]
    BackendError(String),

    /// A stored row, or a record about to be stored, is malformed.
    #[error("Data integrity error: {0}")]
    DataIntegrityError(String),

    /// The row targeted by the operation is not stored.
    #[error("Entity not found")]
    NotFound,

    /// The database cannot take more connections right now.
    #[error("Unavailable")]
    Unavailable,
}

impl From<ModelError> for DbError {
    fn from(e: ModelError) -> Self {
        DbError::DataIntegrityError(e.to_string())
    }
}

/// Result type for this module.
pub type DbResult<T> = Result<T, DbError>;

/// A database executor that can talk to multiple database implementations.
///
/// Users of this type are forced to destructure it and issue different calls for each database,
/// which is needed because every backend has its own SQL dialect.
pub enum Executor {
    /// A PostgreSQL connection taken from the pool.
    Postgres(PoolConnection<Postgres>),

    /// A SQLite connection taken from the pool.
    Sqlite(PoolConnection<Sqlite>),
}

/// Abstraction over the database connection.
#[async_trait]
pub trait Db {
    /// Takes a connection out of the pool.
    ///
    /// The connection goes back to the pool when the returned `Executor` is dropped.
    async fn ex(&self) -> DbResult<Executor>;

    /// Closes the connection pool, waiting for in-flight operations to complete.
    async fn close(&self);
}

/// Initializes the database schema.
pub async fn init_schema(ex: &mut Executor) -> DbResult<()> {
    match ex {
        Executor::Postgres(conn) => postgres::run_schema(conn, include_str!("postgres.sql")).await,
        Executor::Sqlite(conn) => sqlite::run_schema(conn, include_str!("sqlite.sql")).await,
    }
}

impl TryFrom<PgRow> for Customer {
    type Error = DbError;

    fn try_from(row: PgRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(postgres::map_sqlx_error)?;
        let name: String = row.try_get("name").map_err(postgres::map_sqlx_error)?;
        let email: String = row.try_get("email").map_err(postgres::map_sqlx_error)?;
        let age: i32 = row.try_get("age").map_err(postgres::map_sqlx_error)?;

        Ok(Customer::new(name, EmailAddress::from_stored(email), age).with_id(CustomerId::new(id)))
    }
}

impl TryFrom<SqliteRow> for Customer {
    type Error = DbError;

    fn try_from(row: SqliteRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(sqlite::map_sqlx_error)?;
        let name: String = row.try_get("name").map_err(sqlite::map_sqlx_error)?;
        let email: String = row.try_get("email").map_err(sqlite::map_sqlx_error)?;
        let age: i32 = row.try_get("age").map_err(sqlite::map_sqlx_error)?;

        Ok(Customer::new(name, EmailAddress::from_stored(email), age).with_id(CustomerId::new(id)))
    }
}

/// Persistence operations on customers.
///
/// Implementations are stateless translators between `Customer` and the storage: they do not
/// enforce any business rule other than those backed by the schema itself.
#[async_trait]
pub(crate) trait CustomerDao {
    /// Gets all existing customers.  The order of the returned records is unspecified.
    async fn select_all(&self) -> DbResult<Vec<Customer>>;

    /// Gets the customer identified by `id`, or `None` if it does not exist.
    async fn select_by_id(&self, id: CustomerId) -> DbResult<Option<Customer>>;

    /// Persists a new `customer`, ignoring its `id` if any, and returns the identifier assigned
    /// by the database.
    async fn insert(&self, customer: &Customer) -> DbResult<CustomerId>;

    /// Checks whether any customer is registered with `email`.
    async fn exists_by_email(&self, email: &EmailAddress) -> DbResult<bool>;

    /// Checks whether the customer identified by `id` exists.
    async fn exists_by_id(&self, id: CustomerId) -> DbResult<bool>;

    /// Deletes the customer identified by `id`.  Deleting a non-existent customer is a no-op.
    async fn delete_by_id(&self, id: CustomerId) -> DbResult<()>;

    /// Overwrites the name, email and age of the existing `customer` with the values it carries.
    ///
    /// The `customer` must have an identifier and must exist, or else this fails with
    /// `DataIntegrityError` or `NotFound` respectively.
    async fn update(&self, customer: &Customer) -> DbResult<()>;
}

/// Selects which `CustomerDao` implementation backs the service.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum DaoKind {
    /// Hand-written SQL queries.
    #[default]
    Sql,

    /// Delegation to the generic entity repository.
    Repository,
}

impl DaoKind {
    /// Reads the implementation to use from the `<prefix>_DAO` environment variable, defaulting
    /// to `Sql` when not set.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        Ok(get_optional_var::<DaoKind>(prefix, "DAO")?.unwrap_or_default())
    }

    /// Instantiates the selected implementation on top of `db`.
    pub(crate) fn build(self, db: Arc<dyn Db + Send + Sync>) -> Arc<dyn CustomerDao + Send + Sync> {
        match self {
            DaoKind::Sql => Arc::new(SqlCustomerDao::new(db)),
            DaoKind::Repository => Arc::new(RepositoryCustomerDao::new(db)),
        }
    }
}

impl TryFrom<Value> for DaoKind {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let raw = String::try_from(value)?;
        match raw.as_str() {
            "sql" => Ok(DaoKind::Sql),
            "repository" => Ok(DaoKind::Repository),
            _ => Err(format!("Unknown data access implementation '{}'", raw)),
        }
    }
}

impl fmt::Display for DaoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoKind::Sql => f.write_str("sql"),
            DaoKind::Repository => f.write_str("repository"),
        }
    }
}
