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

//! Data access to customers via hand-written SQL queries.

use crate::db::{CustomerDao, Db, DbError, DbResult, Executor, postgres, sqlite};
use crate::model::{Customer, CustomerId, EmailAddress};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Implementation of `CustomerDao` that issues hand-written queries for every backend.
pub(crate) struct SqlCustomerDao {
    /// The database to talk to.
    db: Arc<dyn Db + Send + Sync>,
}

impl SqlCustomerDao {
    /// Creates a new DAO backed by `db`.
    pub(crate) fn new(db: Arc<dyn Db + Send + Sync>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CustomerDao for SqlCustomerDao {
    async fn select_all(&self) -> DbResult<Vec<Customer>> {
        let query_str = "SELECT id, name, email, age FROM customer ORDER BY id";
        match self.db.ex().await? {
            Executor::Postgres(mut conn) => {
                let rows = sqlx::query(query_str)
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(postgres::map_sqlx_error)?;
                rows.into_iter().map(Customer::try_from).collect()
            }

            Executor::Sqlite(mut conn) => {
                let rows = sqlx::query(query_str)
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(sqlite::map_sqlx_error)?;
                rows.into_iter().map(Customer::try_from).collect()
            }
        }
    }

    async fn select_by_id(&self, id: CustomerId) -> DbResult<Option<Customer>> {
        match self.db.ex().await? {
            Executor::Postgres(mut conn) => {
                let query_str = "SELECT id, name, email, age FROM customer WHERE id = $1";
                let row = sqlx::query(query_str)
                    .bind(id.as_i64())
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(postgres::map_sqlx_error)?;
                row.map(Customer::try_from).transpose()
            }

            Executor::Sqlite(mut conn) => {
                let query_str = "SELECT id, name, email, age FROM customer WHERE id = ?";
                let row = sqlx::query(query_str)
                    .bind(id.as_i64())
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(sqlite::map_sqlx_error)?;
                row.map(Customer::try_from).transpose()
            }
        }
    }

    async fn insert(&self, customer: &Customer) -> DbResult<CustomerId> {
        match self.db.ex().await? {
            Executor::Postgres(mut conn) => {
                let query_str =
                    "INSERT INTO customer (name, email, age) VALUES ($1, $2, $3) RETURNING id";
                let row = sqlx::query(query_str)
                    .bind(customer.name())
                    .bind(customer.email().as_str())
                    .bind(customer.age())
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(postgres::map_sqlx_error)?;
                let id: i64 = row.try_get("id").map_err(postgres::map_sqlx_error)?;
                Ok(CustomerId::new(id))
            }

            Executor::Sqlite(mut conn) => {
                let query_str = "INSERT INTO customer (name, email, age) VALUES (?, ?, ?)";
                let done = sqlx::query(query_str)
                    .bind(customer.name())
                    .bind(customer.email().as_str())
                    .bind(customer.age())
                    .execute(&mut *conn)
                    .await
                    .map_err(sqlite::map_sqlx_error)?;
                Ok(CustomerId::new(done.last_insert_rowid()))
            }
        }
    }

    async fn exists_by_email(&self, email: &EmailAddress) -> DbResult<bool> {
        let count: i64 = match self.db.ex().await? {
            Executor::Postgres(mut conn) => {
                let query_str = "SELECT COUNT(*) AS count FROM customer WHERE email = $1";
                let row = sqlx::query(query_str)
                    .bind(email.as_str())
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(postgres::map_sqlx_error)?;
                row.try_get("count").map_err(postgres::map_sqlx_error)?
            }

            Executor::Sqlite(mut conn) => {
                let query_str = "SELECT COUNT(*) AS count FROM customer WHERE email = ?";
                let row = sqlx::query(query_str)
                    .bind(email.as_str())
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(sqlite::map_sqlx_error)?;
                row.try_get("count").map_err(sqlite::map_sqlx_error)?
            }
        };
        Ok(count > 0)
    }

    async fn exists_by_id(&self, id: CustomerId) -> DbResult<bool> {
        let count: i64 = match self.db.ex().await? {
            Executor::Postgres(mut conn) => {
                let query_str = "SELECT COUNT(*) AS count FROM customer WHERE id = $1";
                let row = sqlx::query(query_str)
                    .bind(id.as_i64())
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(postgres::map_sqlx_error)?;
                row.try_get("count").map_err(postgres::map_sqlx_error)?
            }

            Executor::Sqlite(mut conn) => {
                let query_str = "SELECT COUNT(*) AS count FROM customer WHERE id = ?";
                let row = sqlx::query(query_str)
                    .bind(id.as_i64())
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(sqlite::map_sqlx_error)?;
                row.try_get("count").map_err(sqlite::map_sqlx_error)?
            }
        };
        Ok(count > 0)
    }

    async fn delete_by_id(&self, id: CustomerId) -> DbResult<()> {
        match self.db.ex().await? {
            Executor::Postgres(mut conn) => {
                sqlx::query("DELETE FROM customer WHERE id = $1")
                    .bind(id.as_i64())
                    .execute(&mut *conn)
                    .await
                    .map_err(postgres::map_sqlx_error)?;
            }

            Executor::Sqlite(mut conn) => {
                sqlx::query("DELETE FROM customer WHERE id = ?")
                    .bind(id.as_i64())
                    .execute(&mut *conn)
                    .await
                    .map_err(sqlite::map_sqlx_error)?;
            }
        }
        Ok(())
    }

    async fn update(&self, customer: &Customer) -> DbResult<()> {
        let id = match customer.id() {
            Some(id) => id,
            None => {
                return Err(DbError::DataIntegrityError(
                    "Cannot update a customer that was never stored".to_owned(),
                ));
            }
        };

        let rows_affected = match self.db.ex().await? {
            Executor::Postgres(mut conn) => {
                let query_str = "UPDATE customer SET name = $1, email = $2, age = $3 WHERE id = $4";
                let done = sqlx::query(query_str)
                    .bind(customer.name())
                    .bind(customer.email().as_str())
                    .bind(customer.age())
                    .bind(id.as_i64())
                    .execute(&mut *conn)
                    .await
                    .map_err(postgres::map_sqlx_error)?;
                done.rows_affected()
            }

            Executor::Sqlite(mut conn) => {
                let query_str = "UPDATE customer SET name = ?, email = ?, age = ? WHERE id = ?";
                let done = sqlx::query(query_str)
                    .bind(customer.name())
                    .bind(customer.email().as_str())
                    .bind(customer.age())
                    .bind(id.as_i64())
                    .execute(&mut *conn)
                    .await
                    .map_err(sqlite::map_sqlx_error)?;
                done.rows_affected()
            }
        };

        match rows_affected {
            0 => Err(DbError::NotFound),
            1 => Ok(()),
            n => Err(DbError::DataIntegrityError(format!(
                "Customer update affected {} rows instead of 1",
                n
            ))),
        }
    }
}
