// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compose document translation.
//!
//! Only the subset of the compose format that maps onto a single-host
//! container create is understood: `image`, `environment`, `ports` and
//! `command`. Other service keys are ignored.

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

/// Errors from compose translation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("invalid compose document: {0}")]
    Parse(String),
    #[error("compose document declares no services")]
    NoServices,
    #[error("service '{0}' has no image")]
    MissingImage(String),
    #[error("service '{service}' has invalid port '{port}'")]
    InvalidPort { service: String, port: String },
}

/// One container to create for a compose service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub image: String,
    /// `None` passes the variable through from the engine host's environment.
    pub environment: Vec<(String, Option<String>)>,
    pub ports: Vec<PortSpec>,
    pub command: Vec<String>,
}

/// A port exposed by a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    /// Host side, optionally with a bind address (`127.0.0.1:8080`).
    pub published: Option<String>,
    pub target: u16,
    pub protocol: String,
}

impl PortSpec {
    /// Value for the engine's publish flag: `[published:]target/protocol`.
    pub fn to_flag(&self) -> String {
        match &self.published {
            Some(published) => format!("{}:{}/{}", published, self.target, self.protocol),
            None => format!("{}/{}", self.target, self.protocol),
        }
    }
}

/// Turns a compose document into per-service container specs.
pub trait ComposeTranslator: Send + Sync + 'static {
    /// Services in declaration order.
    fn translate(&self, document: &str) -> Result<Vec<ServiceSpec>, ComposeError>;
}

/// [`ComposeTranslator`] for YAML compose documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlComposeTranslator;

impl ComposeTranslator for YamlComposeTranslator {
    fn translate(&self, document: &str) -> Result<Vec<ServiceSpec>, ComposeError> {
        let file: ComposeFile =
            serde_yaml::from_str(document).map_err(|e| ComposeError::Parse(e.to_string()))?;
        if file.services.is_empty() {
            return Err(ComposeError::NoServices);
        }

        file.services
            .into_iter()
            .map(|(name, raw)| {
                let image = raw.image.ok_or_else(|| ComposeError::MissingImage(name.clone()))?;
                let ports = raw
                    .ports
                    .into_iter()
                    .map(|port| port.into_spec(&name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ServiceSpec {
                    environment: raw.environment.map(RawEnvironment::into_pairs).unwrap_or_default(),
                    command: raw.command.map(RawCommand::into_args).unwrap_or_default(),
                    name,
                    image,
                    ports,
                })
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct ComposeFile {
    #[serde(default)]
    services: IndexMap<String, RawService>,
}

#[derive(Deserialize)]
struct RawService {
    image: Option<String>,
    #[serde(default)]
    environment: Option<RawEnvironment>,
    #[serde(default)]
    ports: Vec<RawPort>,
    #[serde(default)]
    command: Option<RawCommand>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnvironment {
    List(Vec<String>),
    Map(IndexMap<String, Option<serde_yaml::Value>>),
}

impl RawEnvironment {
    fn into_pairs(self) -> Vec<(String, Option<String>)> {
        match self {
            RawEnvironment::List(entries) => entries
                .into_iter()
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (entry, None),
                })
                .collect(),
            RawEnvironment::Map(map) => map
                .into_iter()
                .map(|(k, v)| match v {
                    None | Some(serde_yaml::Value::Null) => (k, None),
                    Some(v) => (k, Some(scalar_to_string(v))),
                })
                .collect(),
        }
    }
}

fn scalar_to_string(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(&other).map(|s| s.trim().to_string()).unwrap_or_default(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCommand {
    Line(String),
    Args(Vec<String>),
}

impl RawCommand {
    fn into_args(self) -> Vec<String> {
        match self {
            RawCommand::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            RawCommand::Args(args) => args,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u16),
    Short(String),
    Long {
        target: u16,
        #[serde(default)]
        published: Option<serde_yaml::Value>,
        #[serde(default)]
        host_ip: Option<String>,
        #[serde(default)]
        protocol: Option<String>,
    },
}

impl RawPort {
    fn into_spec(self, service: &str) -> Result<PortSpec, ComposeError> {
        match self {
            RawPort::Number(target) => {
                Ok(PortSpec { published: None, target, protocol: "tcp".to_string() })
            }
            RawPort::Short(text) => parse_short_port(&text).ok_or_else(|| {
                ComposeError::InvalidPort { service: service.to_string(), port: text.clone() }
            }),
            RawPort::Long { target, published, host_ip, protocol } => {
                let published = published.map(scalar_to_string).filter(|p| !p.is_empty());
                let published = match (host_ip, published) {
                    (Some(ip), Some(p)) => Some(format!("{ip}:{p}")),
                    (_, p) => p,
                };
                Ok(PortSpec {
                    published,
                    target,
                    protocol: protocol.unwrap_or_else(|| "tcp".to_string()),
                })
            }
        }
    }
}

/// `[[ip:]published:]target[/protocol]`
fn parse_short_port(text: &str) -> Option<PortSpec> {
    let (ports, protocol) = match text.rsplit_once('/') {
        Some((ports, proto)) if !proto.is_empty() => (ports, proto.to_string()),
        Some(_) => return None,
        None => (text, "tcp".to_string()),
    };
    let (published, target) = match ports.rsplit_once(':') {
        Some((published, target)) if !published.is_empty() => {
            (Some(published.to_string()), target)
        }
        Some(_) => return None,
        None => (None, ports),
    };
    let target = target.trim().parse().ok()?;
    Some(PortSpec { published, target, protocol })
}

#[cfg(test)]
#[path = "compose_tests.rs"]
mod tests;
