// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SURP environment resolution for the CLI.

use std::fmt;

/// Interface and group taken from `SURP_IF` / `SURP_GROUP`.
pub struct Environment {
    pub interface: String,
    pub group: String,
}

#[derive(Debug)]
pub struct MissingVar(&'static str);

impl fmt::Display for MissingVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} environment variable is required", self.0)
    }
}

impl std::error::Error for MissingVar {}

impl Environment {
    pub fn from_env() -> Result<Self, MissingVar> {
        let interface = std::env::var("SURP_IF").map_err(|_| MissingVar("SURP_IF"))?;
        let group = std::env::var("SURP_GROUP").map_err(|_| MissingVar("SURP_GROUP"))?;
        Ok(Environment { interface, group })
    }
}
