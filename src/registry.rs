//! Per-user server registry on top of a [ProfileStore].
//!
//! Every mutation is a full load, an edit of one user's entry and a full
//! save, serialized by `writer` so two users saving at once cannot drop
//! each other's changes. Reads go straight to the store; the store's
//! atomic replace means a reader sees either the old or the new document.
use anyhow::{Context, Result};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::logutil::{escape_log, CHAT_PREVIEW};
use crate::profile::{ConnectionProfile, ProfileId, UserId};
use crate::storage::{ProfileStore, StoreData};

/// Counts reported by `rconbot status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrySummary {
    pub users: usize,
    pub profiles: usize,
}

pub struct ServerRegistry {
    store: Arc<dyn ProfileStore>,
    writer: Mutex<()>,
}

impl ServerRegistry {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<StoreData> {
        self.store.load().context("server registry is unreadable")
    }

    /// The user's servers in ascending id order.
    pub async fn list(&self, user: UserId) -> Result<Vec<(ProfileId, ConnectionProfile)>> {
        let data = self.load()?;
        Ok(data
            .users
            .get(&user.to_string())
            .map(|u| u.servers.iter().map(|(id, p)| (*id, p.clone())).collect())
            .unwrap_or_default())
    }

    pub async fn get(&self, user: UserId, id: ProfileId) -> Result<Option<ConnectionProfile>> {
        let data = self.load()?;
        Ok(data
            .users
            .get(&user.to_string())
            .and_then(|u| u.servers.get(&id).cloned()))
    }

    /// Store a new profile and return its freshly allocated id.
    pub async fn add(&self, user: UserId, profile: ConnectionProfile) -> Result<ProfileId> {
        let _guard = self.writer.lock().await;
        let mut data = self.load()?;
        let entry = data.users.entry(user.to_string()).or_default();
        let id = entry.allocate_id();
        info!(
            "user {} added server {} '{}' at {}",
            user,
            id,
            escape_log(&profile.name, CHAT_PREVIEW),
            profile.address()
        );
        entry.servers.insert(id, profile);
        self.store.save(&data).context("failed to save server registry")?;
        Ok(id)
    }

    /// Delete a profile. `None` when the user has no server with that id.
    pub async fn remove(&self, user: UserId, id: ProfileId) -> Result<Option<ConnectionProfile>> {
        let _guard = self.writer.lock().await;
        let mut data = self.load()?;
        let removed = data
            .users
            .get_mut(&user.to_string())
            .and_then(|u| u.servers.remove(&id));
        match &removed {
            Some(profile) => {
                self.store.save(&data).context("failed to save server registry")?;
                info!("user {} removed server {} '{}'", user, id, escape_log(&profile.name, CHAT_PREVIEW));
            }
            None => debug!("user {} tried to remove unknown server {}", user, id),
        }
        Ok(removed)
    }

    pub async fn summary(&self) -> Result<RegistrySummary> {
        let data = self.load()?;
        Ok(RegistrySummary {
            users: data.users.values().filter(|u| !u.servers.is_empty()).count(),
            profiles: data.users.values().map(|u| u.servers.len()).sum(),
        })
    }
}
