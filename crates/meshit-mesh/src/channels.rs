//! IRC-style channel membership.
//!
//! Channels come into existence implicitly: the first local join or the
//! first observed remote activity creates the entry. The service owns all
//! membership state and emits [`ChannelEvent`]s for the router to broadcast;
//! it never builds packets itself.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::SystemTime;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::{MeshError, Result};

/// One channel's state.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Normalized name (lowercase, `#`-prefixed).
    pub name: String,
    /// Optional password required to join.
    password: Option<String>,
    /// Fingerprints of known members.
    pub member_fingerprints: HashSet<String>,
    /// Known nicknames by fingerprint.
    pub member_names: HashMap<String, String>,
    /// When this channel was first seen.
    pub created_at: SystemTime,
    /// Last join/message/announce observed.
    pub last_activity: SystemTime,
    /// Whether the local node is a member.
    pub is_joined: bool,
}

impl Channel {
    fn new(name: String) -> Self {
        let now = SystemTime::now();
        Self {
            name,
            password: None,
            member_fingerprints: HashSet::new(),
            member_names: HashMap::new(),
            created_at: now,
            last_activity: now,
            is_joined: false,
        }
    }

    /// Number of known members.
    pub fn member_count(&self) -> u32 {
        self.member_fingerprints.len() as u32
    }
}

/// What the service asks the router to broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// We joined; broadcast a join notice.
    JoinBroadcast {
        /// Normalized channel name.
        channel: String,
    },
    /// We left; broadcast a leave notice.
    LeaveBroadcast {
        /// Normalized channel name.
        channel: String,
    },
    /// A message is ready to broadcast.
    MessageReady {
        /// Normalized channel name.
        channel: String,
        /// Message body.
        body: String,
    },
    /// An announce is due for a joined channel.
    AnnounceReady {
        /// Normalized channel name.
        channel: String,
        /// Current member count.
        member_count: u32,
    },
}

/// Channel membership state machine.
pub struct ChannelService {
    local_fingerprint: String,
    nickname: String,
    channels: RwLock<HashMap<String, Channel>>,
    available: RwLock<HashSet<String>>,
    events: UnboundedSender<ChannelEvent>,
}

impl ChannelService {
    /// Create a service for the local node.
    pub fn new(
        local_fingerprint: impl Into<String>,
        nickname: impl Into<String>,
        events: UnboundedSender<ChannelEvent>,
    ) -> Self {
        Self {
            local_fingerprint: local_fingerprint.into(),
            nickname: nickname.into(),
            channels: RwLock::new(HashMap::new()),
            available: RwLock::new(HashSet::new()),
            events,
        }
    }

    /// Normalize a channel name: trim, lowercase, `#` prefix.
    pub fn normalize(name: &str) -> String {
        let trimmed = name.trim().to_lowercase();
        if trimmed.starts_with('#') {
            trimmed
        } else {
            format!("#{trimmed}")
        }
    }

    /// Join a channel, creating it if needed.
    ///
    /// Returns the normalized name.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::Unauthorized`] when the channel has a password
    /// and the supplied one does not match.
    pub fn join(&self, name: &str, password: Option<&str>) -> Result<String> {
        let name = Self::normalize(name);
        {
            let mut channels = self.channels.write().expect("channel map poisoned");
            let channel = channels
                .entry(name.clone())
                .or_insert_with(|| Channel::new(name.clone()));

            if let Some(stored) = &channel.password {
                if password != Some(stored.as_str()) {
                    return Err(MeshError::Unauthorized(name));
                }
            } else {
                // First joiner with a password protects the channel.
                channel.password = password.map(str::to_string);
            }

            channel
                .member_fingerprints
                .insert(self.local_fingerprint.clone());
            channel
                .member_names
                .insert(self.local_fingerprint.clone(), self.nickname.clone());
            channel.is_joined = true;
            channel.last_activity = SystemTime::now();
        }
        self.available
            .write()
            .expect("available set poisoned")
            .remove(&name);

        debug!(channel = %name, "joined channel");
        let _ = self.events.send(ChannelEvent::JoinBroadcast {
            channel: name.clone(),
        });
        Ok(name)
    }

    /// Leave a channel.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::NotJoined`] when we are not a member.
    pub fn leave(&self, name: &str) -> Result<()> {
        let name = Self::normalize(name);
        {
            let mut channels = self.channels.write().expect("channel map poisoned");
            let channel = channels
                .get_mut(&name)
                .filter(|c| c.is_joined)
                .ok_or_else(|| MeshError::NotJoined(name.clone()))?;

            channel.member_fingerprints.remove(&self.local_fingerprint);
            channel.member_names.remove(&self.local_fingerprint);
            channel.is_joined = false;
        }
        self.available
            .write()
            .expect("available set poisoned")
            .insert(name.clone());

        debug!(channel = %name, "left channel");
        let _ = self.events.send(ChannelEvent::LeaveBroadcast { channel: name });
        Ok(())
    }

    /// Queue a message for broadcast into a joined channel.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::NotJoined`] when we are not a member.
    pub fn send_message(&self, name: &str, body: &str) -> Result<()> {
        let name = Self::normalize(name);
        {
            let mut channels = self.channels.write().expect("channel map poisoned");
            let channel = channels
                .get_mut(&name)
                .filter(|c| c.is_joined)
                .ok_or_else(|| MeshError::NotJoined(name.clone()))?;
            channel.last_activity = SystemTime::now();
        }
        let _ = self.events.send(ChannelEvent::MessageReady {
            channel: name,
            body: body.to_string(),
        });
        Ok(())
    }

    /// Emit an announce for every joined channel.
    pub fn announce_all(&self) {
        let announcements: Vec<(String, u32)> = {
            let channels = self.channels.read().expect("channel map poisoned");
            channels
                .values()
                .filter(|c| c.is_joined)
                .map(|c| (c.name.clone(), c.member_count()))
                .collect()
        };
        for (channel, member_count) in announcements {
            let _ = self.events.send(ChannelEvent::AnnounceReady {
                channel,
                member_count,
            });
        }
    }

    // ------------------------------------------------------------------
    // Remote observations (fed from router events)
    // ------------------------------------------------------------------

    /// A remote peer joined a channel.
    pub fn on_remote_join(&self, name: &str, fingerprint: &str, nickname: &str) {
        let name = Self::normalize(name);
        let joined = {
            let mut channels = self.channels.write().expect("channel map poisoned");
            let channel = channels
                .entry(name.clone())
                .or_insert_with(|| Channel::new(name.clone()));
            channel.member_fingerprints.insert(fingerprint.to_string());
            channel
                .member_names
                .insert(fingerprint.to_string(), nickname.to_string());
            channel.last_activity = SystemTime::now();
            channel.is_joined
        };
        if !joined {
            self.available
                .write()
                .expect("available set poisoned")
                .insert(name);
        }
    }

    /// A remote peer left a channel.
    pub fn on_remote_leave(&self, name: &str, fingerprint: &str) {
        let name = Self::normalize(name);
        let mut channels = self.channels.write().expect("channel map poisoned");
        if let Some(channel) = channels.get_mut(&name) {
            channel.member_fingerprints.remove(fingerprint);
            channel.member_names.remove(fingerprint);
            channel.last_activity = SystemTime::now();
        }
    }

    /// A remote peer's message touched a channel.
    pub fn on_remote_message(&self, name: &str, fingerprint: &str, nickname: Option<&str>) {
        let name = Self::normalize(name);
        let joined = {
            let mut channels = self.channels.write().expect("channel map poisoned");
            let channel = channels
                .entry(name.clone())
                .or_insert_with(|| Channel::new(name.clone()));
            channel.member_fingerprints.insert(fingerprint.to_string());
            if let Some(nickname) = nickname {
                channel
                    .member_names
                    .insert(fingerprint.to_string(), nickname.to_string());
            }
            channel.last_activity = SystemTime::now();
            channel.is_joined
        };
        if !joined {
            self.available
                .write()
                .expect("available set poisoned")
                .insert(name);
        }
    }

    /// A remote peer announced a channel.
    pub fn on_remote_announce(&self, name: &str, fingerprint: &str, nickname: &str) {
        self.on_remote_join(name, fingerprint, nickname);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Names of channels we are joined to.
    pub fn joined_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .read()
            .expect("channel map poisoned")
            .values()
            .filter(|c| c.is_joined)
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Names of channels observed on the mesh but not joined.
    pub fn available_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .available
            .read()
            .expect("available set poisoned")
            .iter()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Snapshot of a channel's state.
    pub fn channel(&self, name: &str) -> Option<Channel> {
        self.channels
            .read()
            .expect("channel map poisoned")
            .get(&Self::normalize(name))
            .cloned()
    }

    /// Members of a channel as `(fingerprint, nickname)` pairs.
    pub fn members(&self, name: &str) -> Vec<(String, Option<String>)> {
        let channels = self.channels.read().expect("channel map poisoned");
        let Some(channel) = channels.get(&Self::normalize(name)) else {
            return Vec::new();
        };
        let mut members: Vec<(String, Option<String>)> = channel
            .member_fingerprints
            .iter()
            .map(|fp| (fp.clone(), channel.member_names.get(fp).cloned()))
            .collect();
        members.sort();
        members
    }
}
