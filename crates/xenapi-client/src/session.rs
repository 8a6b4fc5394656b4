//! Session façade over the XenAPI wire protocol.
//!
//! `XenSession` owns the server-issued session token and the retained login
//! credentials. Every call runs classify → transform → invoke → interpret:
//! the name is classified against the recognized-operation table, rewritten
//! to its wire form, the token is injected, and the result envelope is
//! collapsed into a value or an error. Login and logout are the only
//! operations that mutate session state; recognized pass-through calls never
//! touch it, and unrecognized names fail before any network activity.

use log::{debug, info, warn};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::XenConnectionConfig;
use crate::error::{XenError, XenResult};
use crate::methods::{self, MethodKind};
use crate::transport::{XenTransport, XmlRpcTransport};
use crate::types::Credentials;

/// Shared handle for callers driving one session from several tasks.
pub type XenSessionState = Arc<Mutex<XenSession>>;

/// Stateful XenAPI client: one instance per logical server session.
pub struct XenSession {
    transport: Box<dyn XenTransport>,
    session_ref: Option<String>,
    credentials: Option<Credentials>,
}

// Keeps the transport (not `Debug`) and the credential pair out of debug
// output; the session token stands in as a logged-in flag.
impl std::fmt::Debug for XenSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XenSession")
            .field("endpoint", &self.transport.endpoint())
            .field("logged_in", &self.session_ref.is_some())
            .finish()
    }
}

impl XenSession {
    /// Façade over the default XML-RPC transport with default settings
    /// (self-signed certificates accepted, 30 s timeout). No credentials are
    /// stored until the first login.
    pub fn new(uri: &str) -> XenResult<Self> {
        Self::connect(&XenConnectionConfig::new(uri, "", ""))
    }

    /// Façade over the default XML-RPC transport with explicit settings.
    ///
    /// Credentials present in the config are retained so a parameterless
    /// [`login`](Self::login) can use them; nothing touches the network
    /// until a call is made.
    pub fn connect(config: &XenConnectionConfig) -> XenResult<Self> {
        let transport = XmlRpcTransport::new(config)?;
        Ok(Self::connect_with(config, Box::new(transport)))
    }

    /// Façade over an explicit transport, retaining credentials from `config`.
    ///
    /// [`connect`](Self::connect) builds the default XML-RPC transport and
    /// delegates here; callers bringing their own [`XenTransport`] use this
    /// directly.
    pub fn connect_with(config: &XenConnectionConfig, transport: Box<dyn XenTransport>) -> Self {
        let credentials = if config.user.is_empty() {
            None
        } else {
            Some(Credentials::new(&config.user, &config.password))
        };
        Self {
            transport,
            session_ref: None,
            credentials,
        }
    }

    /// Façade over any transport implementation.
    pub fn with_transport(transport: Box<dyn XenTransport>) -> Self {
        Self {
            transport,
            session_ref: None,
            credentials: None,
        }
    }

    /// Load a JSON config file and log in before returning.
    pub async fn from_config_file(path: impl AsRef<Path>) -> XenResult<Self> {
        let config = XenConnectionConfig::from_file(path)?;
        let mut session = Self::connect(&config)?;
        session.login().await?;
        Ok(session)
    }

    // ── Generic dispatch ─────────────────────────────────────────────────

    /// Invoke a recognized operation by its caller-facing name.
    ///
    /// `login…` names run the login protocol and return the new session
    /// token; `logout…` names run the logout protocol and return `true`;
    /// every other recognized name is forwarded with the session token
    /// prepended and yields the envelope's unwrapped value.
    pub async fn call(&mut self, name: &str, args: Vec<Value>) -> XenResult<Value> {
        match methods::classify(name) {
            Some(MethodKind::Login) => {
                let token = self.do_login(name, args).await?;
                Ok(Value::String(token))
            }
            Some(MethodKind::Logout) => {
                self.do_logout(name).await?;
                Ok(Value::Bool(true))
            }
            Some(MethodKind::PassThrough) => self.dispatch(name, args).await,
            None => Err(XenError::UnsupportedMethod(name.to_string())),
        }
    }

    /// Whether `name` is a recognized operation; identical rules as dispatch.
    pub fn supports(&self, name: &str) -> bool {
        methods::is_supported(name)
    }

    // ── Convenience wrappers ─────────────────────────────────────────────

    /// Log in with explicit credentials, storing them for later re-login.
    pub async fn login_with_password(&mut self, user: &str, password: &str) -> XenResult<String> {
        self.do_login(
            "login_with_password",
            vec![
                Value::String(user.to_string()),
                Value::String(password.to_string()),
            ],
        )
        .await
    }

    /// Log in again with the stored credentials.
    pub async fn login(&mut self) -> XenResult<String> {
        self.do_login("login_with_password", Vec::new()).await
    }

    /// End the current session; trivially succeeds when none exists.
    pub async fn logout(&mut self) -> XenResult<()> {
        self.do_logout("logout").await
    }

    // ── Accessors ────────────────────────────────────────────────────────

    /// Current session token, when logged in.
    pub fn session_ref(&self) -> Option<&str> {
        self.session_ref.as_deref()
    }

    /// True while a session token is held.
    pub fn is_logged_in(&self) -> bool {
        self.session_ref.is_some()
    }

    /// Stored login username, if any.
    pub fn user(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.user.as_str())
    }

    /// Endpoint this session talks to.
    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    // ── Login / logout protocols ─────────────────────────────────────────

    async fn do_login(&mut self, name: &str, args: Vec<Value>) -> XenResult<String> {
        let credentials = self.credentials_for_login(args)?;
        let wire = format!("session.{}", name);
        debug!("XenAPI login via {} as {}", wire, credentials.user);

        let params = vec![
            Value::String(credentials.user.clone()),
            Value::String(credentials.password.clone()),
        ];
        let response = self.transport.call(&wire, params).await?;
        match response.into_result() {
            Ok(Value::String(token)) => {
                self.session_ref = Some(token.clone());
                info!("XenAPI session established for {}", credentials.user);
                Ok(token)
            }
            Ok(other) => Err(XenError::Parse(format!(
                "login returned a non-string session reference: {}",
                other
            ))),
            // A failed attempt leaves the previous token exactly as it was.
            Err(message) => {
                warn!("XenAPI login failed for {}: {}", credentials.user, message);
                Err(XenError::Auth(message))
            }
        }
    }

    /// Resolve the credential pair for a login attempt.
    ///
    /// Explicit credentials overwrite the stored pair before any network
    /// traffic, so even a failed attempt leaves them stored. With no
    /// arguments the previously stored pair is reused.
    fn credentials_for_login(&mut self, args: Vec<Value>) -> XenResult<Credentials> {
        if args.is_empty() {
            return self.credentials.clone().ok_or_else(|| {
                XenError::Auth("no credentials available; log in with a username and password".into())
            });
        }
        if args.len() != 2 {
            return Err(XenError::Auth(format!(
                "login takes a username and password pair, got {} arguments",
                args.len()
            )));
        }
        let credentials = match args.as_slice() {
            [Value::String(user), Value::String(password)] => Credentials::new(user, password),
            _ => return Err(XenError::Auth("login credentials must be strings".into())),
        };
        self.credentials = Some(credentials.clone());
        Ok(credentials)
    }

    async fn do_logout(&mut self, name: &str) -> XenResult<()> {
        let token = match &self.session_ref {
            Some(token) => token.clone(),
            // Logging out twice, or without ever logging in, is never an
            // error and needs no round-trip.
            None => {
                debug!("XenAPI logout with no active session");
                return Ok(());
            }
        };

        let wire = format!("session.{}", name);
        let response = self.transport.call(&wire, vec![Value::String(token)]).await?;
        match response.into_result() {
            Ok(_) => {
                self.session_ref = None;
                info!("XenAPI session closed");
                Ok(())
            }
            // The server kept the session alive; so do we.
            Err(message) => {
                warn!("XenAPI logout failed: {}", message);
                Err(XenError::Api(message))
            }
        }
    }

    // ── Pass-through invocation ──────────────────────────────────────────

    async fn dispatch(&self, name: &str, args: Vec<Value>) -> XenResult<Value> {
        let token = match &self.session_ref {
            Some(token) => token.clone(),
            None => return Err(XenError::NotLoggedIn),
        };

        let wire = methods::wire_method_name(name);
        debug!("XenAPI → {} ({} args)", wire, args.len());

        let mut params = Vec::with_capacity(args.len() + 1);
        params.push(Value::String(token));
        params.extend(args);

        let response = self.transport.call(&wire, params).await?;
        response.into_result().map_err(XenError::Api)
    }
}
