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

//! PostgreSQL backend, used in production.

use crate::db::{Db, DbError, DbResult, Executor};
use crate::env::{get_optional_var, get_required_var};
use async_trait::async_trait;
use derivative::Derivative;
use log::warn;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, Postgres};
use std::time::Duration;

/// How many times to retry acquiring a connection while the server is saturated, unless
/// configured otherwise.
const DEFAULT_ACQUIRE_RETRIES: u16 = 60;

/// How long to wait for a free connection in the pool before giving up on one attempt.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound of the delay between two connection attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// SQLSTATE reported on `UNIQUE` constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE reported when the server refuses new connections.
const TOO_MANY_CONNECTIONS: &str = "53300";

/// Converts a PostgreSQL error `e` into a `DbError`.
pub fn map_sqlx_error(e: sqlx::Error) -> DbError {
    match e {
        sqlx::Error::ColumnDecode { index, source } => {
            DbError::DataIntegrityError(format!("Cannot decode column {}: {}", index, source))
        }
        sqlx::Error::Database(e) => match e.code().as_deref() {
            Some(UNIQUE_VIOLATION) => DbError::AlreadyExists,
            Some(TOO_MANY_CONNECTIONS) => DbError::Unavailable,
            Some(code) => DbError::BackendError(format!("PostgreSQL {}: {}", code, e.message())),
            None => DbError::BackendError(format!("PostgreSQL: {}", e.message())),
        },
        sqlx::Error::PoolTimedOut => DbError::Unavailable,
        sqlx::Error::RowNotFound => DbError::NotFound,
        e => DbError::BackendError(e.to_string()),
    }
}

/// Connection settings for a PostgreSQL server.
#[derive(Derivative)]
#[derivative(Debug, Default)]
#[cfg_attr(test, derivative(PartialEq))]
pub struct PostgresOptions {
    /// Server hostname.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Name of the database holding the `customer` table.
    pub database: String,

    /// Role to log in as.
    pub username: String,

    /// Password of the role.  Never printed.
    #[derivative(Debug = "ignore")]
    pub password: String,

    /// Lower bound of the pool size, or the sqlx default if `None`.
    pub min_connections: Option<u32>,

    /// Upper bound of the pool size, or the sqlx default if `None`.
    pub max_connections: Option<u32>,

    /// How many times to retry acquiring a connection while the server is saturated.
    pub acquire_retries: u16,
}

impl PostgresOptions {
    /// Reads the settings from the `<prefix>_*` environment variables.
    ///
    /// `HOST`, `PORT`, `DATABASE`, `USERNAME` and `PASSWORD` are required.  `MIN_CONNECTIONS`,
    /// `MAX_CONNECTIONS` and `MAX_RETRIES` are optional.
    pub fn from_env(prefix: &str) -> Result<PostgresOptions, String> {
        let acquire_retries =
            get_optional_var::<u16>(prefix, "MAX_RETRIES")?.unwrap_or(DEFAULT_ACQUIRE_RETRIES);
        Ok(PostgresOptions {
            host: get_required_var(prefix, "HOST")?,
            port: get_required_var(prefix, "PORT")?,
            database: get_required_var(prefix, "DATABASE")?,
            username: get_required_var(prefix, "USERNAME")?,
            password: get_required_var(prefix, "PASSWORD")?,
            min_connections: get_optional_var(prefix, "MIN_CONNECTIONS")?,
            max_connections: get_optional_var(prefix, "MAX_CONNECTIONS")?,
            acquire_retries,
        })
    }

    /// Builds the sqlx connection settings.
    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
    }

    /// Builds the sqlx pool settings.
    fn pool_options(&self) -> PgPoolOptions {
        let mut options = PgPoolOptions::new().acquire_timeout(ACQUIRE_TIMEOUT);
        if let Some(min) = self.min_connections {
            options = options.min_connections(min);
        }
        if let Some(max) = self.max_connections {
            options = options.max_connections(max);
        }
        options
    }
}

/// Computes a random delay in `[base, base + spread)` milliseconds.
fn jitter(base: u64, spread: u16) -> Duration {
    Duration::from_millis(base + u64::from(rand::random::<u16>() % spread))
}

/// A database instance backed by a PostgreSQL server.
pub struct PostgresDb {
    /// Connection pool to the server.
    pool: PgPool,

    /// How many times to retry acquiring a connection while the server is saturated.
    acquire_retries: u16,
}

impl PostgresDb {
    /// Creates a connection pool to the server described by `opts`.
    ///
    /// Connections are opened lazily, so this does not fail if the server is down.
    pub fn connect(opts: PostgresOptions) -> Self {
        let pool = opts.pool_options().connect_lazy_with(opts.connect_options());
        Self { pool, acquire_retries: opts.acquire_retries }
    }

    /// Takes a connection from the pool, backing off and retrying while the server reports that
    /// it has too many connections.
    async fn acquire(&self) -> DbResult<PoolConnection<Postgres>> {
        let mut delay = jitter(100, 900);
        for attempts_left in (0..=self.acquire_retries).rev() {
            match self.pool.acquire().await.map_err(map_sqlx_error) {
                Err(DbError::Unavailable) if attempts_left > 0 => {
                    warn!(
                        "PostgreSQL is saturated; retrying in {}ms ({} attempts left)",
                        delay.as_millis(),
                        attempts_left
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay + jitter(0, 1000)).min(MAX_RETRY_DELAY);
                }
                result => return result,
            }
        }
        Err(DbError::Unavailable)
    }
}

impl Drop for PostgresDb {
    fn drop(&mut self) {
        if !self.pool.is_closed() {
            warn!("PostgreSQL pool dropped without calling close()");
        }
    }
}

#[async_trait]
impl Db for PostgresDb {
    async fn ex(&self) -> DbResult<Executor> {
        Ok(Executor::Postgres(self.acquire().await?))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Runs the `schema` statements on `conn`.
pub(crate) async fn run_schema(conn: &mut PoolConnection<Postgres>, schema: &str) -> DbResult<()> {
    sqlx::raw_sql(schema).execute(&mut **conn).await.map_err(map_sqlx_error)?;
    Ok(())
}
