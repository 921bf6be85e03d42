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

//! Helpers to drive the customer API in-process from tests.

use crate::db::{CustomerDao, DaoKind, Db, init_schema, sqlite};
use crate::driver::Driver;
use crate::model::{Customer, CustomerId, EmailAddress};
use crate::rest::{ErrorResponse, app};
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{self, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower::util::ServiceExt;

/// Largest response body the checkers are willing to read.
const BODY_LIMIT: usize = 64 * 1024;

/// Prepares one request against the router and sends it.
#[must_use]
pub(crate) struct OneShotBuilder {
    /// Router that receives the request.
    app: Router,

    /// Request being assembled.
    request: http::request::Builder,
}

impl OneShotBuilder {
    /// Starts a request for `method` and `uri` to be served by `app`.
    pub(crate) fn new<U: AsRef<str>>(app: Router, (method, uri): (http::Method, U)) -> Self {
        Self { app, request: Request::builder().method(method).uri(uri.as_ref()) }
    }

    /// Adds the `name: value` header to the request.
    pub(crate) fn with_header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.request = self.request.header(name, value);
        self
    }

    /// Delivers the request with `body` and wraps the outcome for inspection.
    async fn send(self, body: Body) -> ResponseChecker {
        let request = self.request.body(body).unwrap();
        let response = self.app.oneshot(request).await.unwrap();
        ResponseChecker { response, expected: StatusCode::OK }
    }

    /// Sends the request without a body.
    pub(crate) async fn send_empty(self) -> ResponseChecker {
        self.send(Body::empty()).await
    }

    /// Sends the request with `text` as a `text/plain` body.
    pub(crate) async fn send_text<T: Into<String>>(mut self, text: T) -> ResponseChecker {
        self.request = self.request.header(http::header::CONTENT_TYPE, mime::TEXT_PLAIN.as_ref());
        self.send(Body::from(text.into())).await
    }

    /// Sends the request with `payload` serialized as a JSON body.
    pub(crate) async fn send_json<T: Serialize>(mut self, payload: T) -> ResponseChecker {
        self.request =
            self.request.header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
        self.send(Body::from(serde_json::to_vec(&payload).unwrap())).await
    }
}

/// Assertions on the response to a request sent via `OneShotBuilder`.
///
/// The status code defaults to `200 OK` and is checked by every terminal method.
#[must_use]
pub(crate) struct ResponseChecker {
    /// Response returned by the router.
    response: Response,

    /// Status code the response must carry.
    expected: StatusCode,
}

impl ResponseChecker {
    /// Overrides the status code the response must carry.
    pub(crate) fn expect_status(mut self, status: StatusCode) -> Self {
        self.expected = status;
        self
    }

    /// Checks the status code and reads the whole body.
    async fn into_body(self) -> Bytes {
        assert_eq!(self.expected, self.response.status());
        axum::body::to_bytes(self.response.into_body(), BODY_LIMIT).await.unwrap()
    }

    /// Checks the status code and reads the whole body as a string.
    async fn into_text(self) -> String {
        String::from_utf8(self.into_body().await.to_vec()).unwrap()
    }

    /// Expects a response without a body.
    pub(crate) async fn expect_empty(self) {
        let text = self.into_text().await;
        assert!(text.is_empty(), "Expected no body but got {}", text);
    }

    /// Expects an `ErrorResponse` whose message matches `pattern`.
    pub(crate) async fn expect_error(self, pattern: &str) {
        let body = self.into_body().await;
        let error = serde_json::from_slice::<ErrorResponse>(&body).unwrap_or_else(|e| {
            panic!("Not an error response ({}): {}", e, String::from_utf8_lossy(&body))
        });
        assert!(
            Regex::new(pattern).unwrap().is_match(&error.message),
            "Error message '{}' does not match '{}'",
            error.message,
            pattern
        );
    }

    /// Expects a body that deserializes into a `T` and returns it.
    pub(crate) async fn expect_json<T: DeserializeOwned>(self) -> T {
        serde_json::from_slice::<T>(&self.into_body().await).unwrap()
    }

    /// Expects a plain-text body matching `pattern`.
    ///
    /// Errors produced by our handlers are JSON; those must be checked with `expect_error`.
    pub(crate) async fn expect_text(self, pattern: &str) {
        let text = self.into_text().await;
        assert!(!text.contains("\"message\":"), "Got an ErrorResponse: {}", text);
        assert!(
            Regex::new(pattern).unwrap().is_match(&text),
            "Body '{}' does not match '{}'",
            text,
            pattern
        );
    }

    /// Checks the status code and returns the raw body as a string.
    pub(crate) async fn take_body_as_text(self) -> String {
        self.into_text().await
    }

    /// Checks the status code and hands back the response for custom checks (e.g. headers).
    pub(crate) async fn take_response(self) -> Response {
        assert_eq!(self.expected, self.response.status());
        self.response
    }
}

/// Emits a test that sends non-JSON payloads to `$route` and expects axum to reject them.
macro_rules! test_payload_must_be_json {
    ( $route:expr ) => {
        #[tokio::test]
        async fn test_payload_must_be_json() {
            let context = $crate::rest::testutils::TestContext::setup().await;

            // Rejected by the Json extractor, so the bodies are plain text.
            $crate::rest::testutils::OneShotBuilder::new(context.app(), $route)
                .send_text("{name: James}")
                .await
                .expect_status(axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE)
                .expect_text("Content-Type")
                .await;

            $crate::rest::testutils::OneShotBuilder::new(context.app(), $route)
                .with_header(axum::http::header::CONTENT_TYPE, "application/json")
                .send_text("{name: James}")
                .await
                .expect_status(axum::http::StatusCode::BAD_REQUEST)
                .expect_text("key must be a string")
                .await;

            assert!(context.get_all().await.is_empty());

            context.teardown().await;
        }
    };
}

pub(crate) use test_payload_must_be_json;

/// Emits a test that sends a payload to a body-less `$route` and expects a rejection.
macro_rules! test_payload_must_be_empty {
    ( $route:expr ) => {
        #[tokio::test]
        async fn test_payload_must_be_empty() {
            let context = $crate::rest::testutils::TestContext::setup().await;

            $crate::rest::testutils::OneShotBuilder::new(context.app(), $route)
                .send_text("unexpected")
                .await
                .expect_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE)
                .expect_error("should be empty")
                .await;

            context.teardown().await;
        }
    };
}

pub(crate) use test_payload_must_be_empty;

/// A router wired to a fresh in-memory database, plus direct access to the stored customers.
pub(crate) struct TestContext {
    /// Database shared by the router and the test.
    db: Arc<dyn Db + Send + Sync>,

    /// DAO used to arrange and inspect state without going through the API.
    dao: Arc<dyn CustomerDao + Send + Sync>,

    /// Router under test.
    app: Router,
}

impl TestContext {
    /// Builds the router on top of an empty in-memory database.
    pub(crate) async fn setup() -> Self {
        let db: Arc<dyn Db + Send + Sync> = Arc::new(sqlite::testutils::setup().await);
        init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        let dao = DaoKind::default().build(db.clone());
        let app = app(Driver::new(dao.clone()));
        Self { db, dao, app }
    }

    /// Returns a handle to the router, which is cheap to clone.
    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    /// Stores a customer bypassing the API and returns it with its assigned id.
    pub(crate) async fn insert(&self, name: &str, email: &str, age: i32) -> Customer {
        let customer = Customer::new(name, EmailAddress::from(email), age);
        let id = self.dao.insert(&customer).await.unwrap();
        customer.with_id(id)
    }

    /// Reads customer `id` bypassing the API.
    pub(crate) async fn get(&self, id: CustomerId) -> Option<Customer> {
        self.dao.select_by_id(id).await.unwrap()
    }

    /// Reads all customers bypassing the API.
    pub(crate) async fn get_all(&self) -> Vec<Customer> {
        self.dao.select_all().await.unwrap()
    }

    /// Closes the database.
    pub(crate) async fn teardown(self) {
        self.db.close().await;
    }
}
