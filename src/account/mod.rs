//! Account Module
//!
//! Resolves a connection string into a [`StorageAccount`]: the account name,
//! its credentials (kept opaque, never interpreted) and the table endpoint.
//!
//! ## Endpoint Schemes
//! - `memory://<name>`: process-wide in-memory store named `<name>`
//! - `file://<path>`: WAL-backed local store in directory `<path>`
//! - `http(s)://<host>`: remote table service (needs an injected client)

mod connection_string;

pub use connection_string::ConnectionString;

use std::fmt;
use std::path::PathBuf;

use crate::error::{Result, TableError};

/// Account name used by `UseDevelopmentStorage=true`
pub const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Where the tables of an account live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Named in-memory store shared by every client in this process
    Memory { name: String },

    /// Local store persisted in a directory
    File { path: PathBuf },

    /// Remote table service
    Remote { url: String },
}

impl Endpoint {
    /// Parse an endpoint URL
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let (scheme, rest) = url.split_once("://").ok_or_else(|| {
            TableError::InvalidConnectionString(format!("endpoint {:?} has no scheme", url))
        })?;

        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            return Err(TableError::InvalidConnectionString(format!(
                "endpoint {:?} has no location",
                url
            )));
        }

        match scheme.to_ascii_lowercase().as_str() {
            "memory" => Ok(Endpoint::Memory {
                name: rest.to_string(),
            }),
            "file" => Ok(Endpoint::File {
                path: PathBuf::from(rest),
            }),
            "http" | "https" => Ok(Endpoint::Remote {
                url: url.trim_end_matches('/').to_string(),
            }),
            other => Err(TableError::InvalidConnectionString(format!(
                "unsupported endpoint scheme {:?}",
                other
            ))),
        }
    }

    /// Scheme name of this endpoint
    pub fn scheme(&self) -> &'static str {
        match self {
            Endpoint::Memory { .. } => "memory",
            Endpoint::File { .. } => "file",
            Endpoint::Remote { .. } => "remote",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Memory { name } => write!(f, "memory://{}", name),
            Endpoint::File { path } => write!(f, "file://{}", path.display()),
            Endpoint::Remote { url } => f.write_str(url),
        }
    }
}

/// Credentials carried by the connection string
///
/// They are handed to whatever client serves the endpoint; the local store
/// ignores them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub account_key: Option<String>,
    pub shared_access_signature: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field(
                "shared_access_signature",
                &self.shared_access_signature.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// A storage account resolved from a connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccount {
    name: String,
    credentials: Credentials,
    endpoint: Endpoint,
}

impl StorageAccount {
    /// Parse a connection string into an account
    pub fn parse(connection_string: &str) -> Result<Self> {
        let cs = ConnectionString::parse(connection_string)?;

        let explicit_endpoint = cs.get("TableEndpoint").map(Endpoint::parse).transpose()?;
        let credentials = Credentials {
            account_key: cs.get("AccountKey").map(str::to_string),
            shared_access_signature: cs.get("SharedAccessSignature").map(str::to_string),
        };

        if cs.get_bool("UseDevelopmentStorage")? == Some(true) {
            let endpoint = explicit_endpoint.unwrap_or_else(|| Endpoint::Memory {
                name: DEV_ACCOUNT_NAME.to_string(),
            });
            return Ok(Self {
                name: DEV_ACCOUNT_NAME.to_string(),
                credentials,
                endpoint,
            });
        }

        let name = cs.get("AccountName").map(str::to_string);

        let endpoint = match (explicit_endpoint, &name) {
            (Some(endpoint), _) => endpoint,
            (None, Some(name)) => {
                let protocol = cs.get("DefaultEndpointsProtocol").unwrap_or("https");
                if !protocol.eq_ignore_ascii_case("https") && !protocol.eq_ignore_ascii_case("http")
                {
                    return Err(TableError::InvalidConnectionString(format!(
                        "DefaultEndpointsProtocol must be http or https, got {:?}",
                        protocol
                    )));
                }
                let suffix = cs.get("EndpointSuffix").unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                Endpoint::parse(&format!(
                    "{}://{}.table.{}",
                    protocol.to_ascii_lowercase(),
                    name,
                    suffix
                ))?
            }
            (None, None) => {
                return Err(TableError::InvalidConnectionString(
                    "missing AccountName or TableEndpoint".to_string(),
                ))
            }
        };

        let name = name.unwrap_or_else(|| match &endpoint {
            Endpoint::Memory { name } => name.clone(),
            Endpoint::File { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Endpoint::Remote { .. } => String::new(),
        });

        Ok(Self {
            name,
            credentials,
            endpoint,
        })
    }

    /// Account name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Credentials from the connection string
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Table endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
