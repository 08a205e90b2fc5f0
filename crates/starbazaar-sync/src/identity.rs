//! Claimant identity and the clock claims are stamped with.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};

/// A resolved, authenticated identity supplied by the identity provider.
///
/// The id is opaque and is stored verbatim as the star's `owner_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimant {
    id: String,
    email: Option<String>,
}

impl Claimant {
    /// Wrap an identity. A blank id is not an identity.
    pub fn new(id: impl Into<String>, email: Option<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::PreconditionFailed(
                "You need to log in before claiming a star.".into(),
            ));
        }
        Ok(Self { id, email })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

/// Source of "now" for claim timestamps and day boundaries.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
