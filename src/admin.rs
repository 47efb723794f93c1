//! Admin session management.
//!
//! A low-assurance convenience layer: a nick logs in with a secret and holds an
//! elevated session until it times out, logs out, leaves, or changes nick.
//! Sessions are bound to the full identity that logged in, so another
//! connection picking up the same nick does not inherit them.
//!
//! Configuration problems never fail open: the subsystem is simply disabled.

use crate::clock::deadline;
use crate::config::AdminConfig;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

/// How `login` secrets are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// One secret valid for any nick.
    Shared(String),
    /// Secret per nick.
    PerNick(HashMap<String, String>),
    /// Everyone is an admin. Local development only.
    Test,
}

impl Credentials {
    pub fn scheme_name(&self) -> &'static str {
        match self {
            Self::Shared(_) => "shared",
            Self::PerNick(_) => "per_nick",
            Self::Test => "test",
        }
    }

    /// Build credentials from config, or `None` when the config is unusable.
    fn from_config(config: &AdminConfig) -> Option<Self> {
        let scheme = config.scheme.as_deref().unwrap_or("per_nick");
        match scheme {
            "shared" | "stupid" => match config.password.as_deref().map(str::trim) {
                Some(password) if !password.is_empty() => {
                    info!("Admin system initialized with a shared secret");
                    Some(Self::Shared(password.to_string()))
                }
                _ => {
                    warn!("Admin configuration error: shared scheme requires a password");
                    None
                }
            },
            "per_nick" | "simple" => {
                let admins: HashMap<String, String> = config
                    .admins
                    .iter()
                    .filter(|(nick, secret)| !nick.is_empty() && !secret.trim().is_empty())
                    .map(|(nick, secret)| (nick.clone(), secret.trim().to_string()))
                    .collect();
                if admins.is_empty() {
                    warn!("Admin configuration error: per_nick scheme has no usable admins");
                    return None;
                }
                info!(count = admins.len(), "Admin system initialized with per-nick secrets");
                Some(Self::PerNick(admins))
            }
            "test" => {
                warn!("TEST ADMIN SCHEME IS ON: every user is an admin");
                Some(Self::Test)
            }
            other => {
                warn!(scheme = %other, "Admin configuration error: unsupported scheme");
                None
            }
        }
    }

    fn accepts(&self, nick: &str, supplied: &str) -> bool {
        let supplied = supplied.trim().as_bytes();
        match self {
            Self::Shared(secret) => supplied.ct_eq(secret.as_bytes()).into(),
            Self::PerNick(admins) => admins
                .get(nick)
                .is_some_and(|secret| supplied.ct_eq(secret.as_bytes()).into()),
            Self::Test => true,
        }
    }
}

/// An elevated grant held by one nick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub identity: String,
    pub expires_at: Instant,
}

impl AdminSession {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug)]
pub struct AdminSessionManager {
    credentials: Option<Credentials>,
    timeout: Duration,
    sessions: HashMap<String, AdminSession>,
}

impl AdminSessionManager {
    pub fn new(credentials: Credentials, timeout: Duration) -> Self {
        Self {
            credentials: Some(credentials),
            timeout,
            sessions: HashMap::new(),
        }
    }

    /// A manager that rejects every login.
    pub fn disabled() -> Self {
        Self {
            credentials: None,
            timeout: Duration::ZERO,
            sessions: HashMap::new(),
        }
    }

    /// Build from the `[admin]` section, disabling admin features on any problem.
    pub fn from_config(config: Option<&AdminConfig>) -> Self {
        let Some(config) = config else {
            warn!("Admin not configured: all admin functionality disabled");
            return Self::disabled();
        };
        if !config.enabled {
            warn!("Admin disabled in configuration");
            return Self::disabled();
        }
        match Credentials::from_config(config) {
            Some(credentials) => {
                let timeout = Duration::from_secs(if config.timeout == 0 {
                    crate::config::defaults::default_admin_timeout()
                } else {
                    config.timeout
                });
                Self::new(credentials, timeout)
            }
            None => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn scheme(&self) -> Option<&'static str> {
        self.credentials.as_ref().map(Credentials::scheme_name)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check `supplied` and open a session for `nick` on success.
    ///
    /// A successful login overwrites any previous session for the nick.
    pub fn login(&mut self, identity: &str, nick: &str, supplied: &str, now: Instant) -> bool {
        let Some(credentials) = &self.credentials else {
            info!(nick = %nick, "Admin login rejected: admin system disabled");
            return false;
        };
        if !credentials.accepts(nick, supplied) {
            info!(nick = %nick, "Admin login failed");
            return false;
        }

        self.sessions.insert(
            nick.to_string(),
            AdminSession {
                identity: identity.to_string(),
                expires_at: deadline(now, self.timeout),
            },
        );
        info!(nick = %nick, identity = %identity, "Admin login succeeded");
        true
    }

    /// Drop the session for `nick`, returning whether one existed.
    pub fn logout(&mut self, nick: &str) -> bool {
        self.clear(nick)
    }

    pub fn is_admin(&self, identity: &str, nick: &str, now: Instant) -> bool {
        match &self.credentials {
            None => false,
            Some(Credentials::Test) => true,
            Some(_) => self
                .sessions
                .get(nick)
                .is_some_and(|s| s.identity == identity && s.is_live(now)),
        }
    }

    /// Extend a live session after an admin command. Expiry never moves back.
    pub fn touch(&mut self, nick: &str, now: Instant) {
        let timeout = self.timeout;
        if let Some(session) = self.sessions.get_mut(nick)
            && session.is_live(now)
        {
            session.expires_at = session.expires_at.max(deadline(now, timeout));
        }
    }

    pub fn session(&self, nick: &str) -> Option<&AdminSession> {
        self.sessions.get(nick)
    }

    pub fn clear(&mut self, nick: &str) -> bool {
        self.sessions.remove(nick).is_some()
    }

    pub fn clear_all(&mut self) {
        self.sessions.clear();
    }

    /// Nicks with a live session, sorted.
    pub fn list_active(&self, now: Instant) -> Vec<String> {
        let mut nicks: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_live(now))
            .map(|(nick, _)| nick.clone())
            .collect();
        nicks.sort();
        nicks
    }

    /// Emergency kill switch: drop every session and refuse all further logins
    /// until restart.
    pub fn disable(&mut self) {
        self.sessions.clear();
        self.credentials = None;
        warn!("Admin system disabled until restart");
    }
}
