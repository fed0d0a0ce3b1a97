//! User directory.
//!
//! `set_user_data` commands carry author profiles (id, display name, avatar)
//! ahead of the chat messages that reference them. The directory stores them
//! for the chat view; an author with no stored profile resolves to a default
//! so a late or missing `set_user_data` never breaks rendering.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dispatch::CommandRouter;
use crate::identifiers::HandlerId;
use crate::protocol::{ParsedCommand, names};

// ============================================================================
// Constants
// ============================================================================

/// Avatar used for authors with no stored profile.
pub const DEFAULT_AVATAR: &str = "/images/default_avatar.png";

// ============================================================================
// UserProfile
// ============================================================================

/// One user's display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id, the key chat messages reference via `author`.
    pub uid: String,
    /// Display name.
    pub name: String,
    /// Avatar image path.
    pub icon: String,
}

impl UserProfile {
    /// Fallback profile for an unknown author: uid as the name, stock
    /// avatar.
    #[must_use]
    pub fn unknown(uid: impl Into<String>) -> Self {
        let uid = uid.into();
        Self {
            name: uid.clone(),
            icon: DEFAULT_AVATAR.to_string(),
            uid,
        }
    }
}

// ============================================================================
// UserDirectory
// ============================================================================

/// Profile store fed by `set_user_data` commands.
#[derive(Default)]
pub struct UserDirectory {
    /// uid → profile.
    profiles: RwLock<FxHashMap<String, UserProfile>>,
    /// Registration token for `detach`.
    handler: Mutex<Option<HandlerId>>,
}

impl UserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers the `set_user_data` handler on a router.
    pub fn attach(self: &Arc<Self>, router: &CommandRouter) {
        let directory = Arc::clone(self);
        let id = router.register(
            names::SET_USER_DATA,
            Arc::new(move |msg| {
                if let ParsedCommand::SetUserData { uid, name, icon } = msg.parse_command() {
                    directory.insert(UserProfile { uid, name, icon });
                }
                Ok(())
            }),
        );

        *self.handler.lock() = Some(id);
    }

    /// Unregisters the `set_user_data` handler.
    pub fn detach(&self, router: &CommandRouter) {
        if let Some(id) = self.handler.lock().take() {
            router.unregister(id);
        }
    }

    /// Stores a profile, replacing any previous entry for the uid.
    pub fn insert(&self, profile: UserProfile) {
        debug!(uid = %profile.uid, name = %profile.name, "user profile stored");
        self.profiles.write().insert(profile.uid.clone(), profile);
    }

    /// Returns the stored profile for a uid.
    #[must_use]
    pub fn get(&self, uid: &str) -> Option<UserProfile> {
        self.profiles.read().get(uid).cloned()
    }

    /// Resolves a uid, falling back to [`UserProfile::unknown`].
    #[must_use]
    pub fn resolve(&self, uid: &str) -> UserProfile {
        self.get(uid).unwrap_or_else(|| UserProfile::unknown(uid))
    }

    /// Returns the number of stored profiles.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    /// Returns `true` if no profiles are stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
