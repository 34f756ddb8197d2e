//! Canonical content digests for forms
//!
//! A digest is the hex-encoded SHA-256 of the form's canonical JSON: compact,
//! with every object's keys in sorted order. `serde_json::Map` is a
//! `BTreeMap` unless the `preserve_order` feature is enabled, so going
//! through `serde_json::Value` is enough to normalize key order no matter how
//! the form was written.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::Result;
use crate::form::Form;

/// Hex-encoded SHA-256 of a form's canonical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Digest {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Digest {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical JSON bytes of a form.
pub fn canonical_bytes(form: &Form) -> Result<Vec<u8>> {
    let value = serde_json::to_value(form)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Compute the digest of a form.
pub fn hash(form: &Form) -> Result<Digest> {
    let bytes = canonical_bytes(form)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(Digest(hex::encode(hasher.finalize())))
}
