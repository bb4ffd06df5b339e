//! # Storage Module - Profile Persistence
//!
//! Flat-file JSON persistence for every user's server registry. The whole
//! store is one document keyed by user id:
//!
//! ```text
//! data/
//! ├── servers.json        ← { "<user id>": { "next_id": 3, "servers": { "1": {...}, "2": {...} } } }
//! └── .servers.json.lock  ← advisory lock taken while writing
//! ```
//!
//! The [ProfileStore] trait is the seam the registry talks to: a full
//! `load` and a full `save`. [JsonFileStore] implements it with an
//! exclusive lock and write-temp-then-rename, so a crash mid-save leaves
//! either the old or the new document, never a torn one.
//!
//! Documents written by the first release (user → { id → profile } with no
//! counter) are still accepted; see [UserServers]. That release did not
//! range-check ports, so an entry that no longer parses as a profile is set
//! aside under `quarantined` rather than failing every user's load.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rconbot::storage::{JsonFileStore, ProfileStore};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = JsonFileStore::new("./data")?;
//!     let data = store.load()?;
//!     println!("{} users", data.users.len());
//!     store.save(&data)?;
//!     Ok(())
//! }
//! ```
use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::profile::{ConnectionProfile, ProfileId};
use crate::validation::secure_json_parse;

/// File name of the registry document inside the data directory.
pub const SERVERS_FILE: &str = "servers.json";

/// Refuse to parse store files larger than this.
const MAX_STORE_BYTES: usize = 16 * 1024 * 1024;

/// The complete persisted document. Keys are user ids rendered as strings.
/// `BTreeMap` keeps serialization order stable so `save(load())` is byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreData {
    pub users: BTreeMap<String, UserServers>,
}

/// One user's servers plus the counter that hands out ids.
///
/// `next_id` only grows, so an id freed by deletion is never handed out
/// again and stale button callbacks cannot hit a different server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredUser")]
pub struct UserServers {
    pub next_id: u64,
    pub servers: BTreeMap<ProfileId, ConnectionProfile>,
    /// Entries that could not be read as profiles, kept verbatim so a save
    /// does not destroy them. Never listed or connected to.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub quarantined: BTreeMap<String, serde_json::Value>,
}

impl UserServers {
    /// Take the next id and bump the counter.
    pub fn allocate_id(&mut self) -> ProfileId {
        let floor = self.servers.keys().next_back().map(|id| id.0 + 1).unwrap_or(1);
        let id = self.next_id.max(floor).max(1);
        self.next_id = id + 1;
        ProfileId(id)
    }
}

/// On-disk shapes. Keys stay strings and entries stay raw JSON here so one
/// bad entry is judged on its own; integer map keys also do not survive
/// serde's untagged buffering.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredUser {
    Current {
        #[serde(default)]
        next_id: u64,
        servers: BTreeMap<String, serde_json::Value>,
        #[serde(default)]
        quarantined: BTreeMap<String, serde_json::Value>,
    },
    Legacy(BTreeMap<String, serde_json::Value>),
}

impl From<StoredUser> for UserServers {
    fn from(stored: StoredUser) -> Self {
        let (next_id, raw, mut quarantined) = match stored {
            StoredUser::Current {
                next_id,
                servers,
                quarantined,
            } => (next_id, servers, quarantined),
            StoredUser::Legacy(servers) => (0, servers, BTreeMap::new()),
        };

        let mut servers = BTreeMap::new();
        for (key, value) in raw {
            let id = key.parse::<ProfileId>();
            let profile = serde_json::from_value::<ConnectionProfile>(value.clone());
            match (id, profile) {
                (Ok(id), Ok(profile)) => {
                    servers.insert(id, profile);
                }
                (Err(_), _) => {
                    warn!("quarantining server entry with invalid id '{}'", key);
                    quarantined.insert(key, value);
                }
                (_, Err(e)) => {
                    warn!("quarantining unreadable server entry {}: {}", key, e);
                    quarantined.insert(key, value);
                }
            }
        }

        // Quarantined ids stay taken.
        let floor = servers
            .keys()
            .map(|id| id.0)
            .chain(quarantined.keys().filter_map(|k| k.parse::<u64>().ok()))
            .max()
            .map(|max| max + 1)
            .unwrap_or(1);
        UserServers {
            next_id: next_id.max(floor),
            servers,
            quarantined,
        }
    }
}

/// Persistence collaborator: whole-document load and save.
pub trait ProfileStore: Send + Sync {
    fn load(&self) -> Result<StoreData>;
    fn save(&self, data: &StoreData) -> Result<()>;
}

/// JSON document on disk with atomic replace.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `<data_dir>/servers.json`, creating the directory if needed.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        Ok(Self {
            path: dir.join(SERVERS_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileStore for JsonFileStore {
    fn load(&self) -> Result<StoreData> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                if content.trim_matches(|c: char| c == '\0' || c.is_whitespace()).is_empty() {
                    return Ok(StoreData::default());
                }
                secure_json_parse(&content, MAX_STORE_BYTES)
                    .map_err(|e| anyhow!("Failed to parse {}: {}", self.path.display(), e))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreData::default()),
            Err(e) => Err(anyhow!("Failed reading {}: {}", self.path.display(), e)),
        }
    }

    fn save(&self, data: &StoreData) -> Result<()> {
        let mut content = serde_json::to_string_pretty(data)
            .map_err(|e| anyhow!("Failed to serialize server registry: {}", e))?;
        content.push('\n');
        write_file_locked(&self.path, &content)?;
        debug!("saved {} ({} users)", self.path.display(), data.users.len());
        Ok(())
    }
}

/// Replace `path` with `content` under an exclusive advisory lock.
///
/// The lock lives on a sidecar file because the rename swaps the inode of
/// `path` itself.
pub fn write_file_locked(path: &Path, content: &str) -> Result<()> {
    use std::fs::{self, File, OpenOptions};
    use std::io::Write;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("data.json");

    // Step 1: exclusive lock on the sidecar
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(dir.join(format!(".{}.lock", base)))?;
    lock_file.lock_exclusive()?;

    // Step 2: unique temp file in the same directory
    let mut counter = 0u32;
    let (tmp_path, mut tmp) = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => break (candidate, file),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
                continue;
            }
            Err(e) => return Err(anyhow!("Failed to create temp file for atomic write: {}", e)),
        }
    };

    // Step 3: write, sync and atomically replace; any failure removes the temp file
    let written = tmp
        .write_all(content.as_bytes())
        .and_then(|_| tmp.flush())
        .and_then(|_| tmp.sync_all())
        .map_err(|e| anyhow!("Failed to write {}: {}", tmp_path.display(), e));
    drop(tmp);
    let replaced = written.and_then(|_| {
        fs::rename(&tmp_path, path).map_err(|e| anyhow!("Failed to replace {}: {}", path.display(), e))
    });
    if let Err(e) = replaced {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    // Step 4: persist the directory entry (best-effort)
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }

    let _ = FileExt::unlock(&lock_file);
    Ok(())
}
