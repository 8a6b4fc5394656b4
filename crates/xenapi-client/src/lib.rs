//! # xenapi-client – XenServer management API client
//!
//! Client library for the XenServer management API (XenAPI) over XML-RPC.
//! A [`XenSession`] recognizes a fixed table of operation names, rewrites
//! each to its wire form, injects the session token, and collapses the
//! server's result envelope into a value or an error.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  XenSession  (session.rs)                            │
//! │  ├── recognized-operation table lookup               │
//! │  ├── login / logout session protocols                │
//! │  └── pass-through: rewrite name, prepend token       │
//! ├──────────────────────────────────────────────────────┤
//! │  XenTransport  (transport.rs)                        │
//! │  └── XmlRpcTransport: HTTPS POST of text/xml         │
//! ├──────────────────────────────────────────────────────┤
//! │  XML-RPC codec  (xmlrpc.rs)                          │
//! │  ├── encode_method_call     (JSON values → XML)      │
//! │  └── parse_method_response  (XML → JSON values)      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Result envelope
//!
//! | Member             | Meaning                                    |
//! |--------------------|--------------------------------------------|
//! | `Status`           | `"Success"`, or any other string on failure |
//! | `Value`            | payload of a successful call               |
//! | `ErrorDescription` | string list; first element is the code     |

// ── Sub-modules ─────────────────────────────────────────────────────────

pub mod error;
pub mod config;
pub mod types;

// Wire level
pub mod methods;
pub mod xmlrpc;
pub mod transport;

// Session façade
pub mod session;

// ── Re-exports for ergonomic access ─────────────────────────────────────

pub use config::XenConnectionConfig;
pub use error::{XenError, XenResult};
pub use session::{XenSession, XenSessionState};
pub use transport::{XenTransport, XmlRpcTransport};
pub use types::{Credentials, MethodResponse};

// Lower-level wire pieces, for callers building their own transport
pub use methods::{MethodKind, MethodRule, METHOD_RULES};
pub use xmlrpc::{encode_method_call, parse_method_response, XmlRpcResponse};
