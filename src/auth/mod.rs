//! Authentication material for the Assemblyline API.
//!
//! The client logs in with a username plus either an API key or a password.
//! See [`Credentials`].

mod credentials;

pub use credentials::{Credentials, CredentialsError};
