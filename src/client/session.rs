//! The Assemblyline session cookie.
//!
//! One client owns one session value. It starts empty, is set by a login or by
//! any non-401 response that carries a fresh `session` cookie, and is sent
//! back on every request. Writes replace the whole value; concurrent calls may
//! race and the last write wins.

use std::sync::{PoisonError, RwLock};

use reqwest::header::COOKIE;
use reqwest::{RequestBuilder, Response};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Default)]
pub(crate) struct SessionStore {
    value: RwLock<String>,
}

impl SessionStore {
    pub(crate) fn new(initial: String) -> Self {
        Self {
            value: RwLock::new(initial),
        }
    }

    /// Current session value. Empty until the first login.
    pub(crate) fn snapshot(&self) -> String {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adds `Cookie: session=<value>`, or nothing while the session is empty.
    pub(crate) fn attach(&self, request: RequestBuilder) -> RequestBuilder {
        let guard = self.value.read().unwrap_or_else(PoisonError::into_inner);
        if guard.is_empty() {
            return request;
        }
        request.header(COOKIE, format!("{SESSION_COOKIE}={}", *guard))
    }

    /// Stores the first `session` cookie set by `response`, if any.
    ///
    /// Returns `true` when the stored value changed.
    pub(crate) fn capture(&self, response: &Response) -> bool {
        let Some(fresh) = response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
        else {
            return false;
        };
        self.replace(fresh)
    }

    fn replace(&self, fresh: String) -> bool {
        let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
        if *guard == fresh {
            return false;
        }
        *guard = fresh;
        true
    }
}
