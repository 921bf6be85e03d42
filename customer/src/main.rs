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

//! Entry point to the customer service.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use customer_service::db::postgres::{PostgresDb, PostgresOptions};
use customer_service::db::{DaoKind, Db, sqlite};
use customer_service::env::get_optional_var;
use customer_service::serve;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Prefix of all environment variables that configure the service.
const PREFIX: &str = "CUSTOMER";

/// Prefix of the environment variables that configure the production PostgreSQL database.
const PGSQL_PREFIX: &str = "PGSQL_PROD";

#[tokio::main]
async fn main() {
    env_logger::init();

    let port = get_optional_var::<u16>(PREFIX, "PORT").unwrap().unwrap_or(8080);
    let addr = (Ipv4Addr::UNSPECIFIED, port);

    let dao_kind = DaoKind::from_env(PREFIX).unwrap();
    let seed_count = get_optional_var::<usize>(PREFIX, "SEED_COUNT").unwrap().unwrap_or(0);

    let backend = get_optional_var::<String>(PREFIX, "DB").unwrap();
    let db: Arc<dyn Db + Send + Sync> = match backend.as_deref().unwrap_or("postgres") {
        "postgres" => {
            let db_opts = PostgresOptions::from_env(PGSQL_PREFIX).unwrap();
            Arc::new(PostgresDb::connect(db_opts))
        }
        "sqlite" => {
            let uri = get_optional_var::<String>(PREFIX, "SQLITE_URI")
                .unwrap()
                .unwrap_or_else(|| "sqlite::memory:".to_owned());
            Arc::new(sqlite::connect(&uri).await.unwrap())
        }
        other => panic!("Unknown database backend '{}'; must be postgres or sqlite", other),
    };

    serve(addr, db, dao_kind, seed_count).await.unwrap()
}
