// SPDX-License-Identifier: MIT OR Apache-2.0
//! Webhook signature verification (C1) and per-repository credential
//! resolution (C2) — spec.md §4.1/§4.2.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod credentials;
mod signature;

pub use credentials::{CredentialProvider, CredentialSource, CredentialStore};
pub use signature::{verify_signature, SignaturePolicy};
