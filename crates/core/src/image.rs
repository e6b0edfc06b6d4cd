// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Digest-pinned image references.

use serde::{Deserialize, Serialize};

/// An image name pinned to a content digest (e.g. `ubuntu` + `sha256:…`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub digest: String,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, digest: impl Into<String>) -> Self {
        Self { name: name.into(), digest: digest.into() }
    }

    /// Engine reference that cannot be re-resolved to a newer tag: `name@digest`.
    pub fn reference(&self) -> String {
        format!("{}@{}", self.name, self.digest)
    }

    /// Registry host for credential lookup, or `None` for the default registry.
    ///
    /// Follows the engine convention: the first path component names a registry
    /// only if it contains a `.` or `:` or is exactly `localhost`.
    pub fn registry_host(&self) -> Option<&str> {
        let (first, _) = self.name.split_once('/')?;
        if first.contains('.') || first.contains(':') || first == "localhost" {
            Some(first)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.digest)
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
