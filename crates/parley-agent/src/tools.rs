//! Plugin tool server configuration.
//!
//! Tool servers are declared in a JSON file shaped like:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "search": { "transportType": "streamable-http", "url": "http://localhost:9000/mcp" },
//!     "files":  { "transportType": "stdio", "command": "files-server", "args": ["--ro"] }
//!   }
//! }
//! ```
//!
//! Parley only reads and reports this configuration; connecting to the
//! servers is left to the tool protocol client.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, warn};

/// How a tool server is reached, selected by its `transportType` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "transportType")]
pub enum ToolTransport {
    /// A networked server speaking streamable HTTP.
    #[serde(rename = "streamable-http")]
    StreamableHttp {
        /// Endpoint of the server.
        url: String,
    },
    /// A child process spoken to over stdin/stdout.
    #[serde(rename = "stdio")]
    Stdio {
        /// Program to launch.
        command: String,
        /// Arguments passed to `command`.
        #[serde(default)]
        args: Vec<String>,
        /// Environment of the child process.
        #[serde(default = "default_stdio_env")]
        env: HashMap<String, String>,
    },
}

fn default_stdio_env() -> HashMap<String, String> {
    HashMap::from([("MCP_TRANSPORT".to_string(), "stdio".to_string())])
}

impl ToolTransport {
    /// The `transportType` name of this transport.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolTransport::StreamableHttp { .. } => "streamable-http",
            ToolTransport::Stdio { .. } => "stdio",
        }
    }
}

/// One entry under `mcpServers`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolServerConfig {
    /// Disabled servers are kept in the file but never used.
    #[serde(default)]
    pub disabled: bool,
    /// How the server is reached.
    #[serde(flatten)]
    pub transport: ToolTransport,
}

/// The whole tool server configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolServersConfig {
    /// Servers by name.
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, ToolServerConfig>,
}

impl ToolServersConfig {
    /// Read the configuration file. A missing or unreadable file yields an
    /// empty configuration so the agent still starts without tools.
    pub async fn load(path: &Path) -> Self {
        let data = match tokio::fs::read_to_string(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(config_path = %path.display(), "Tool server config not found, using empty config");
                return Self::default();
            }
            Err(e) => {
                error!(config_path = %path.display(), error = %e, "Failed to read tool server config");
                return Self::default();
            }
        };

        match serde_json::from_str(&data) {
            Ok(config) => config,
            Err(e) => {
                error!(config_path = %path.display(), error = %e, "Failed to parse tool server config");
                Self::default()
            }
        }
    }

    /// Servers that are not disabled, in name order.
    pub fn enabled(&self) -> impl Iterator<Item = (&str, &ToolServerConfig)> {
        self.servers
            .iter()
            .filter(|(_, server)| !server.disabled)
            .map(|(name, server)| (name.as_str(), server))
    }

    /// Servers that are disabled, in name order.
    pub fn disabled(&self) -> impl Iterator<Item = &str> {
        self.servers
            .iter()
            .filter(|(_, server)| server.disabled)
            .map(|(name, _)| name.as_str())
    }

    /// Whether no server is declared at all.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
