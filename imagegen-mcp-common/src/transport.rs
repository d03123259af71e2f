//! Transport selection for the image server.
//!
//! Three transport modes are supported:
//!
//! - **Stdio**: MCP over stdin/stdout for local subprocess clients. The REST
//!   API is not served in this mode.
//! - **HTTP**: MCP streamable HTTP at `/mcp`, served next to the REST API and
//!   the `/_upload` image directory on one listener.
//! - **SSE**: Same listener as HTTP; kept as a separate mode for clients that
//!   ask for it by name.
//!
//! # Example
//!
//! ```ignore
//! use imagegen_mcp_common::transport::TransportArgs;
//! use clap::Parser;
//!
//! #[derive(Parser)]
//! struct Args {
//!     #[command(flatten)]
//!     transport: TransportArgs,
//! }
//!
//! let args = Args::parse();
//! let transport = args.transport.into_transport();
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Args;

/// Address all network transports bind to unless overridden.
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Transport mode for server communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Standard input/output transport (default).
    #[default]
    Stdio,
    /// HTTP streamable transport plus the REST API.
    Http {
        /// Interface to bind
        host: IpAddr,
        /// Port to listen on
        port: u16,
    },
    /// Server-Sent Events transport plus the REST API.
    Sse {
        /// Interface to bind
        host: IpAddr,
        /// Port to listen on
        port: u16,
    },
}

impl Transport {
    /// Create a new stdio transport.
    pub fn stdio() -> Self {
        Transport::Stdio
    }

    /// Create a new HTTP transport on all interfaces.
    pub fn http(port: u16) -> Self {
        Transport::Http {
            host: DEFAULT_HOST,
            port,
        }
    }

    /// Create a new SSE transport on all interfaces.
    pub fn sse(port: u16) -> Self {
        Transport::Sse {
            host: DEFAULT_HOST,
            port,
        }
    }

    /// Check if this is a stdio transport.
    pub fn is_stdio(&self) -> bool {
        matches!(self, Transport::Stdio)
    }

    /// Whether the REST API and image directory are served.
    pub fn serves_http(&self) -> bool {
        !self.is_stdio()
    }

    /// Get the port if this is a network transport.
    pub fn port(&self) -> Option<u16> {
        self.socket_addr().map(|addr| addr.port())
    }

    /// Get the bind address if this is a network transport.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            Transport::Stdio => None,
            Transport::Http { host, port } | Transport::Sse { host, port } => {
                Some(SocketAddr::new(*host, *port))
            }
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => write!(f, "stdio"),
            Transport::Http { host, port } => write!(f, "http ({})", SocketAddr::new(*host, *port)),
            Transport::Sse { host, port } => write!(f, "sse ({})", SocketAddr::new(*host, *port)),
        }
    }
}

/// Command-line arguments for transport configuration.
#[derive(Args, Debug, Clone)]
pub struct TransportArgs {
    /// Transport mode: stdio, http, or sse
    #[arg(long, default_value = "stdio", value_parser = parse_transport_mode)]
    pub transport: TransportMode,

    /// Interface for HTTP/SSE transport (default: 0.0.0.0, or from HOST env var)
    #[arg(long, env = "HOST", default_value_t = DEFAULT_HOST)]
    pub host: IpAddr,

    /// Port for HTTP/SSE transport (default: 8080, or from PORT env var)
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,
}

/// Transport mode parsed from command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
    Sse,
}

fn parse_transport_mode(s: &str) -> Result<TransportMode, String> {
    match s.to_lowercase().as_str() {
        "stdio" => Ok(TransportMode::Stdio),
        "http" => Ok(TransportMode::Http),
        "sse" => Ok(TransportMode::Sse),
        _ => Err(format!(
            "Invalid transport mode '{}'. Valid options: stdio, http, sse",
            s
        )),
    }
}

impl TransportArgs {
    /// Convert command-line arguments into a Transport configuration.
    pub fn into_transport(self) -> Transport {
        match self.transport {
            TransportMode::Stdio => Transport::Stdio,
            TransportMode::Http => Transport::Http {
                host: self.host,
                port: self.port,
            },
            TransportMode::Sse => Transport::Sse {
                host: self.host,
                port: self.port,
            },
        }
    }
}

impl Default for TransportArgs {
    fn default() -> Self {
        Self {
            transport: TransportMode::Stdio,
            host: DEFAULT_HOST,
            port: 8080,
        }
    }
}
