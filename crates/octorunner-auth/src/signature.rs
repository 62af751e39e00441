// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constant-time HMAC-SHA1 webhook signature check (spec.md §4.1).
//!
//! Grounded on `simple_git_cicd`'s `verify_github_signature` for the overall
//! shape (prefix strip, hex-decode, compare), swapped to SHA1 (spec.md's
//! `X-Hub-Signature` rather than `-256`) and a `subtle::ConstantTimeEq`
//! comparison in place of the teacher's non-constant-time `==` — the one
//! spot this implementation deliberately does not copy the teacher's
//! comparison, since spec.md calls out the timing side-channel explicitly.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_PREFIX: &str = "sha1=";

/// Outcome of checking a webhook's signature against repository
/// configuration, distinguishing "no secret configured" from "checked".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// No secret is configured for this repository; the request is
    /// processed unverified (spec.md §4.1, §9 open question).
    Unverified,
    /// A secret is configured and the signature matched.
    Verified,
    /// A secret is configured but the header was absent or did not match.
    Rejected,
}

/// Verify `signature_header` (`sha1=<hex>`) against `body` under `secret`.
///
/// Returns [`SignaturePolicy::Unverified`] when `secret` is `None`.
#[must_use]
pub fn verify_signature(
    secret: Option<&str>,
    body: &[u8],
    signature_header: Option<&str>,
) -> SignaturePolicy {
    let Some(secret) = secret else {
        tracing::warn!("no webhook secret configured; processing unverified");
        return SignaturePolicy::Unverified;
    };

    let Some(header) = signature_header else {
        tracing::warn!("webhook secret configured but no signature header present");
        return SignaturePolicy::Rejected;
    };

    let Some(hex_sig) = header.strip_prefix(SIGNATURE_PREFIX) else {
        tracing::warn!("signature header missing '{SIGNATURE_PREFIX}' prefix");
        return SignaturePolicy::Rejected;
    };

    let Ok(provided) = hex::decode(hex_sig) else {
        tracing::warn!("signature header is not valid hex");
        return SignaturePolicy::Rejected;
    };

    let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
        tracing::warn!("hmac key initialisation failed");
        return SignaturePolicy::Rejected;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    if computed.len() == provided.len() && bool::from(computed.as_slice().ct_eq(&provided)) {
        SignaturePolicy::Verified
    } else {
        tracing::warn!("webhook signature mismatch");
        SignaturePolicy::Rejected
    }
}
