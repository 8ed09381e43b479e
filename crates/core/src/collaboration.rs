//! Real-time collaboration constants, session modes, and room naming.
//!
//! The socket dispatcher, the persistence gateway, and the janitor all
//! reference these so that thresholds and room names stay in one place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Timing constants
// ---------------------------------------------------------------------------

/// How often the session janitor runs (5 minutes).
pub const JANITOR_INTERVAL_SECS: u64 = 300;

/// Sessions idle for longer than this are swept (10 minutes).
pub const SESSION_STALE_SECS: i64 = 600;

/// Interval between transport-level pings to every socket.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Upper bound on the admin live feed kept in memory.
pub const MAX_AUDIT_FEED_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// Fan-out group for operator dashboards.
pub const ADMIN_ROOM: &str = "admin-live";

/// Fan-out group name for a single page: `page:<id>`.
pub fn page_room(page_id: DbId) -> String {
    format!("page:{page_id}")
}

// ---------------------------------------------------------------------------
// Session mode
// ---------------------------------------------------------------------------

/// Whether a connection is editing a page or only watching it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Editing,
    Viewing,
}

impl SessionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Editing => "editing",
            Self::Viewing => "viewing",
        }
    }

    pub fn is_editing(self) -> bool {
        self == Self::Editing
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "editing" => Ok(Self::Editing),
            "viewing" => Ok(Self::Viewing),
            other => Err(format!("Unknown session mode '{other}'")),
        }
    }
}
