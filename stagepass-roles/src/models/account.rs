//! Platform account as seen by the role workflow
//!
//! The capability flags (`is_artist`, `is_host`, `is_superuser`) are the only source of
//! truth. The categorical [`Role`] is derived from them and written to the database as a
//! cache for other readers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::permissions::{self, Permission, Privilege};

pub type AccountId = i64;

/// Categorical role label (cache of the capability flags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    OrdinaryUser,
    Artist,
    Host,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::OrdinaryUser => "ordinary_user",
            Role::Artist => "artist",
            Role::Host => "host",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability an upgrade request can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Artist,
    Host,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Artist => f.write_str("artist"),
            Capability::Host => f.write_str("host"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub display_name: String,
    pub is_artist: bool,
    pub is_host: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Role label derived from the flags
    pub fn role(&self) -> Role {
        if self.is_superuser {
            Role::Admin
        } else if self.is_artist {
            Role::Artist
        } else if self.is_host {
            Role::Host
        } else {
            Role::OrdinaryUser
        }
    }

    pub fn privilege(&self) -> Privilege {
        if self.is_superuser {
            Privilege::Elevated
        } else {
            Privilege::Standard
        }
    }

    /// Whether the capability flag itself is set (superuser override not applied)
    pub fn holds(&self, capability: Capability) -> bool {
        match capability {
            Capability::Artist => self.is_artist,
            Capability::Host => self.is_host,
        }
    }

    /// Permission check routed through [`permissions::is_permitted`]
    pub fn can(&self, permission: Permission) -> bool {
        permissions::is_permitted(self, permission)
    }

    /// Set a capability flag. Returns false if it was already set.
    pub fn grant(&mut self, capability: Capability, now: DateTime<Utc>) -> bool {
        let flag = match capability {
            Capability::Artist => &mut self.is_artist,
            Capability::Host => &mut self.is_host,
        };
        if *flag {
            return false;
        }
        *flag = true;
        self.updated_at = now;
        true
    }

    pub fn has_dual_role(&self) -> bool {
        self.is_artist && self.is_host
    }

    /// Human readable role name (never stored)
    pub fn display_role(&self) -> &'static str {
        if self.is_superuser {
            "Super Admin"
        } else if self.has_dual_role() {
            "Artist & Host"
        } else if self.is_host {
            "Host"
        } else if self.is_artist {
            "Artist"
        } else {
            "User"
        }
    }
}
