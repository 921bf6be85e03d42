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

//! Data access to customers via a generic entity repository.
//!
//! The repository knows nothing about customers: it derives all of its queries from the metadata
//! exposed by the `Entity` trait, and the customer DAO is a thin adapter on top of it.

use crate::db::{CustomerDao, Db, DbError, DbResult, Executor, postgres, sqlite};
use crate::model::{Customer, CustomerId, EmailAddress};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgArguments, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use std::iter;
use std::marker::PhantomData;
use std::sync::Arc;

/// A column value to bind to a query.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Value {
    /// A 32-bit integer.
    Int(i32),

    /// A 64-bit integer.
    BigInt(i64),

    /// A string.
    Text(String),
}

/// A type that can be persisted in its own table by `EntityRepository`.
pub(crate) trait Entity:
    Send + TryFrom<PgRow, Error = DbError> + TryFrom<SqliteRow, Error = DbError>
{
    /// Name of the table holding the entities.
    const TABLE: &'static str;

    /// Name of the integer primary key column, which the database assigns on insertion.
    const ID_COLUMN: &'static str;

    /// Names of all other columns, in the order returned by `values`.
    const COLUMNS: &'static [&'static str];

    /// Returns the identifier of the entity, if it has been persisted already.
    fn id(&self) -> Option<i64>;

    /// Returns the values of the entity for all `COLUMNS`.
    fn values(&self) -> Vec<Value>;
}

impl Entity for Customer {
    const TABLE: &'static str = "customer";
    const ID_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["name", "email", "age"];

    fn id(&self) -> Option<i64> {
        Customer::id(self).map(CustomerId::as_i64)
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name().to_owned()),
            Value::Text(self.email().as_str().to_owned()),
            Value::Int(self.age()),
        ]
    }
}

/// SQL dialect spoken by an executor.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Dialect {
    /// PostgreSQL, which uses numbered placeholders.
    Postgres,

    /// SQLite, which uses positional placeholders.
    Sqlite,
}

impl Dialect {
    /// Determines the dialect of `ex`.
    fn of(ex: &Executor) -> Self {
        match ex {
            Executor::Postgres(_) => Dialect::Postgres,
            Executor::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Returns the placeholder for the 1-based parameter `n`.
    fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::Sqlite => "?".to_owned(),
        }
    }
}

/// Binds all `values` to a PostgreSQL `query` in order.
fn bind_pg(
    mut query: Query<'_, Postgres, PgArguments>,
    values: Vec<Value>,
) -> Query<'_, Postgres, PgArguments> {
    for value in values {
        query = match value {
            Value::Int(v) => query.bind(v),
            Value::BigInt(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
        };
    }
    query
}

/// Binds all `values` to a SQLite `query` in order.
fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: Vec<Value>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            Value::Int(v) => query.bind(v),
            Value::BigInt(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
        };
    }
    query
}

/// Runs the `sql` query with `values` on `ex` and converts all returned rows to entities.
async fn fetch_entities<E: Entity>(
    ex: Executor,
    sql: &str,
    values: Vec<Value>,
) -> DbResult<Vec<E>> {
    match ex {
        Executor::Postgres(mut conn) => {
            let rows = bind_pg(sqlx::query(sql), values)
                .fetch_all(&mut *conn)
                .await
                .map_err(postgres::map_sqlx_error)?;
            rows.into_iter().map(<E as TryFrom<PgRow>>::try_from).collect()
        }

        Executor::Sqlite(mut conn) => {
            let rows = bind_sqlite(sqlx::query(sql), values)
                .fetch_all(&mut *conn)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            rows.into_iter().map(<E as TryFrom<SqliteRow>>::try_from).collect()
        }
    }
}

/// Runs the `sql` query with `values` on `ex` and extracts the integer `column` of its only row.
async fn fetch_i64(ex: Executor, sql: &str, values: Vec<Value>, column: &str) -> DbResult<i64> {
    match ex {
        Executor::Postgres(mut conn) => {
            let row = bind_pg(sqlx::query(sql), values)
                .fetch_one(&mut *conn)
                .await
                .map_err(postgres::map_sqlx_error)?;
            row.try_get(column).map_err(postgres::map_sqlx_error)
        }

        Executor::Sqlite(mut conn) => {
            let row = bind_sqlite(sqlx::query(sql), values)
                .fetch_one(&mut *conn)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            row.try_get(column).map_err(sqlite::map_sqlx_error)
        }
    }
}

/// Runs the `sql` statement with `values` on `ex` and returns the number of affected rows.
async fn execute(ex: Executor, sql: &str, values: Vec<Value>) -> DbResult<u64> {
    match ex {
        Executor::Postgres(mut conn) => {
            let done = bind_pg(sqlx::query(sql), values)
                .execute(&mut *conn)
                .await
                .map_err(postgres::map_sqlx_error)?;
            Ok(done.rows_affected())
        }

        Executor::Sqlite(mut conn) => {
            let done = bind_sqlite(sqlx::query(sql), values)
                .execute(&mut *conn)
                .await
                .map_err(sqlite::map_sqlx_error)?;
            Ok(done.rows_affected())
        }
    }
}

/// Generic CRUD operations on the table that holds entities of type `E`.
pub(crate) struct EntityRepository<E: Entity> {
    /// The database to talk to.
    db: Arc<dyn Db + Send + Sync>,

    /// Marker for the entity type, which is never stored.
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityRepository<E> {
    /// Creates a new repository backed by `db`.
    pub(crate) fn new(db: Arc<dyn Db + Send + Sync>) -> Self {
        Self { db, _entity: PhantomData }
    }

    /// Returns the comma-separated list of all columns, starting with the identifier.
    fn all_columns() -> String {
        iter::once(E::ID_COLUMN).chain(E::COLUMNS.iter().copied()).collect::<Vec<_>>().join(", ")
    }

    /// Generates the query to fetch all entities.
    fn find_all_sql() -> String {
        format!("SELECT {} FROM {} ORDER BY {}", Self::all_columns(), E::TABLE, E::ID_COLUMN)
    }

    /// Generates the query to fetch one entity by its identifier.
    fn find_by_id_sql(dialect: Dialect) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            Self::all_columns(),
            E::TABLE,
            E::ID_COLUMN,
            dialect.placeholder(1)
        )
    }

    /// Generates the query to count the entities that have a specific value in `column`.
    fn count_by_sql(dialect: Dialect, column: &str) -> String {
        format!(
            "SELECT COUNT(*) AS count FROM {} WHERE {} = {}",
            E::TABLE,
            column,
            dialect.placeholder(1)
        )
    }

    /// Generates the statement to insert a new entity.
    ///
    /// On PostgreSQL, the statement returns the assigned identifier.
    fn insert_sql(dialect: Dialect) -> String {
        let placeholders =
            (1..=E::COLUMNS.len()).map(|n| dialect.placeholder(n)).collect::<Vec<_>>().join(", ");
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::TABLE,
            E::COLUMNS.join(", "),
            placeholders
        );
        if dialect == Dialect::Postgres {
            sql.push_str(&format!(" RETURNING {}", E::ID_COLUMN));
        }
        sql
    }

    /// Generates the statement to overwrite all columns of an existing entity.
    fn update_sql(dialect: Dialect) -> String {
        let assignments = E::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = {}", column, dialect.placeholder(i + 1)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {} WHERE {} = {}",
            E::TABLE,
            assignments,
            E::ID_COLUMN,
            dialect.placeholder(E::COLUMNS.len() + 1)
        )
    }

    /// Generates the statement to delete an entity by its identifier.
    fn delete_by_id_sql(dialect: Dialect) -> String {
        format!("DELETE FROM {} WHERE {} = {}", E::TABLE, E::ID_COLUMN, dialect.placeholder(1))
    }

    /// Gets all entities sorted by their identifier.
    pub(crate) async fn find_all(&self) -> DbResult<Vec<E>> {
        let ex = self.db.ex().await?;
        fetch_entities(ex, &Self::find_all_sql(), vec![]).await
    }

    /// Gets the entity identified by `id`, if any.
    pub(crate) async fn find_by_id(&self, id: i64) -> DbResult<Option<E>> {
        let ex = self.db.ex().await?;
        let sql = Self::find_by_id_sql(Dialect::of(&ex));
        let entities = fetch_entities(ex, &sql, vec![Value::BigInt(id)]).await?;
        Ok(entities.into_iter().next())
    }

    /// Checks whether the entity identified by `id` exists.
    pub(crate) async fn exists_by_id(&self, id: i64) -> DbResult<bool> {
        let ex = self.db.ex().await?;
        let sql = Self::count_by_sql(Dialect::of(&ex), E::ID_COLUMN);
        Ok(fetch_i64(ex, &sql, vec![Value::BigInt(id)], "count").await? > 0)
    }

    /// Checks whether any entity has `value` in `column`.
    pub(crate) async fn exists_by(&self, column: &str, value: Value) -> DbResult<bool> {
        if !E::COLUMNS.contains(&column) {
            return Err(DbError::BackendError(format!(
                "Unknown column {} in table {}",
                column,
                E::TABLE
            )));
        }

        let ex = self.db.ex().await?;
        let sql = Self::count_by_sql(Dialect::of(&ex), column);
        Ok(fetch_i64(ex, &sql, vec![value], "count").await? > 0)
    }

    /// Persists `entity` and returns its identifier.
    ///
    /// Entities without an identifier are inserted as new rows.  Entities with an identifier
    /// overwrite the existing row, which must exist.
    pub(crate) async fn save(&self, entity: &E) -> DbResult<i64> {
        let ex = self.db.ex().await?;
        let dialect = Dialect::of(&ex);
        match entity.id() {
            None => {
                let sql = Self::insert_sql(dialect);
                match ex {
                    Executor::Postgres(mut conn) => {
                        let row = bind_pg(sqlx::query(&sql), entity.values())
                            .fetch_one(&mut *conn)
                            .await
                            .map_err(postgres::map_sqlx_error)?;
                        row.try_get(E::ID_COLUMN).map_err(postgres::map_sqlx_error)
                    }

                    Executor::Sqlite(mut conn) => {
                        let done = bind_sqlite(sqlx::query(&sql), entity.values())
                            .execute(&mut *conn)
                            .await
                            .map_err(sqlite::map_sqlx_error)?;
                        Ok(done.last_insert_rowid())
                    }
                }
            }

            Some(id) => {
                let mut values = entity.values();
                values.push(Value::BigInt(id));
                match execute(ex, &Self::update_sql(dialect), values).await? {
                    0 => Err(DbError::NotFound),
                    _ => Ok(id),
                }
            }
        }
    }

    /// Deletes the entity identified by `id`, if it exists.
    pub(crate) async fn delete_by_id(&self, id: i64) -> DbResult<()> {
        let ex = self.db.ex().await?;
        let sql = Self::delete_by_id_sql(Dialect::of(&ex));
        execute(ex, &sql, vec![Value::BigInt(id)]).await?;
        Ok(())
    }
}

/// Implementation of `CustomerDao` that delegates to an `EntityRepository`.
pub(crate) struct RepositoryCustomerDao {
    /// The generic repository for the customer table.
    repo: EntityRepository<Customer>,
}

impl RepositoryCustomerDao {
    /// Creates a new DAO backed by `db`.
    pub(crate) fn new(db: Arc<dyn Db + Send + Sync>) -> Self {
        Self { repo: EntityRepository::new(db) }
    }
}

#[async_trait]
impl CustomerDao for RepositoryCustomerDao {
    async fn select_all(&self) -> DbResult<Vec<Customer>> {
        self.repo.find_all().await
    }

    async fn select_by_id(&self, id: CustomerId) -> DbResult<Option<Customer>> {
        self.repo.find_by_id(id.as_i64()).await
    }

    async fn insert(&self, customer: &Customer) -> DbResult<CustomerId> {
        // Saving a customer that carries an id would update it instead of inserting it.
        let fresh = Customer::new(customer.name(), customer.email().clone(), customer.age());
        self.repo.save(&fresh).await.map(CustomerId::new)
    }

    async fn exists_by_email(&self, email: &EmailAddress) -> DbResult<bool> {
        self.repo.exists_by("email", Value::Text(email.as_str().to_owned())).await
    }

    async fn exists_by_id(&self, id: CustomerId) -> DbResult<bool> {
        self.repo.exists_by_id(id.as_i64()).await
    }

    async fn delete_by_id(&self, id: CustomerId) -> DbResult<()> {
        self.repo.delete_by_id(id.as_i64()).await
    }

    async fn update(&self, customer: &Customer) -> DbResult<()> {
        if customer.id().is_none() {
            return Err(DbError::DataIntegrityError(
                "Cannot update a customer that was never stored".to_owned(),
            ));
        }
        self.repo.save(customer).await?;
        Ok(())
    }
}
