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

//! Email addresses of customers.

use crate::model::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

/// Longest email address that fits in the `customer.email` column.
pub(crate) const MAX_EMAIL_LENGTH: usize = 255;

/// The email address of a customer.
///
/// Any non-empty string that fits in the database is accepted; no attempt is made to check that
/// it is deliverable.  Comparisons are byte-wise: `Foo@example.com` and `foo@example.com` are
/// different addresses and can thus belong to different customers.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "String", into = "String")]
pub(crate) struct EmailAddress(String);

impl EmailAddress {
    /// Validates `raw` as an email address supplied by a client.
    pub(crate) fn new<S: Into<String>>(raw: S) -> ModelResult<Self> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(ModelError("Email address cannot be empty".to_owned()));
        }
        if raw.len() > MAX_EMAIL_LENGTH {
            return Err(ModelError(format!(
                "Email address cannot be longer than {} bytes",
                MAX_EMAIL_LENGTH
            )));
        }

        Ok(Self(raw))
    }

    /// Wraps an address read back from the database, which is trusted as is.
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    /// Gets the address as a string.
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = ModelError;

    fn try_from(raw: String) -> ModelResult<Self> {
        Self::new(raw)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

#[cfg(test)]
impl From<&str> for EmailAddress {
    fn from(raw: &str) -> Self {
        Self::new(raw).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_test::{Token, assert_de_tokens_error, assert_tokens};

    #[test]
    fn test_emailaddress_accepts() {
        for raw in ["james@email.com", "a+tag@sub.example.org", "email", "not an email", " "] {
            assert_eq!(raw, EmailAddress::new(raw).unwrap().as_str());
        }
    }

    #[test]
    fn test_emailaddress_rejects_empty() {
        assert_eq!(
            ModelError("Email address cannot be empty".to_owned()),
            EmailAddress::new("").unwrap_err()
        );
    }

    #[test]
    fn test_emailaddress_from_stored_skips_checks() {
        assert_eq!("", EmailAddress::from_stored(String::new()).as_str());
    }

    #[test]
    fn test_emailaddress_length_limit() {
        let longest = format!("a@{}", "b".repeat(MAX_EMAIL_LENGTH - 2));
        assert!(EmailAddress::new(longest.as_str()).is_ok());

        let too_long = format!("{}c", longest);
        assert_eq!(
            ModelError("Email address cannot be longer than 255 bytes".to_owned()),
            EmailAddress::new(too_long).unwrap_err()
        );
    }

    #[test]
    fn test_emailaddress_is_case_sensitive() {
        assert_ne!(EmailAddress::from("ana@x.com"), EmailAddress::from("Ana@x.com"));
    }

    #[test]
    fn test_emailaddress_serde() {
        assert_tokens(&EmailAddress::from("ana@x.com"), &[Token::Str("ana@x.com")]);
    }

    #[test]
    fn test_emailaddress_serde_invalid() {
        assert_de_tokens_error::<EmailAddress>(
            &[Token::Str("")],
            "Email address cannot be empty",
        );
    }
}
