pub mod channel;
pub mod content;
pub mod error;
pub mod guild;
pub mod member;
pub mod member_list;
pub mod role;

use std::fmt::{self, Debug};

use channel::{Channel, ChannelKind, Channels};
use guild::{Guild, Guilds};
use member::{Member, Members};
use member_list::CacheView;
use role::Role;
use smol_str::SmolStr;

pub use ahash::AHashMap;
pub use smol_str;
pub use tracing;

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;
pub type EventSender = tokio::sync::mpsc::UnboundedSender<FetchEvent>;
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<FetchEvent>;

/// State changes pushed at the cache by the protocol collaborator (gateway
/// socket, initial sync, REST responses). Only the subset the shell needs is
/// modeled here; everything else stays behind the collaborator boundary.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    ProfileUpdated {
        user_id: u64,
        new_username: Option<String>,
        new_avatar: Option<String>,
        new_deleted: Option<bool>,
    },
    GuildAddedToList {
        guild_id: u64,
        name: String,
    },
    GuildUpdated {
        guild_id: u64,
        new_name: Option<String>,
    },
    GuildRemovedFromList {
        guild_id: u64,
    },
    JoinedMember {
        guild_id: u64,
        member_id: u64,
    },
    LeftMember {
        guild_id: u64,
        member_id: u64,
    },
    UserRolesUpdated {
        guild_id: u64,
        user_id: u64,
        new_role_ids: Vec<u64>,
    },
    RoleCreated {
        guild_id: u64,
        role_id: u64,
        name: String,
        color: i32,
        hoist: bool,
        position: i32,
    },
    RoleUpdated {
        guild_id: u64,
        role_id: u64,
        new_name: Option<String>,
        new_color: Option<i32>,
        new_hoist: Option<bool>,
    },
    RoleMoved {
        guild_id: u64,
        role_id: u64,
        new_position: i32,
    },
    RoleDeleted {
        guild_id: u64,
        role_id: u64,
    },
    ChannelCreated {
        guild_id: Option<u64>,
        channel_id: u64,
        name: String,
        kind: ChannelKind,
    },
    ChannelDeleted {
        guild_id: Option<u64>,
        channel_id: u64,
    },
    ThreadMembersUpdated {
        channel_id: u64,
        members: Vec<u64>,
    },
    InitialSyncComplete,
}

impl FetchEvent {
    /// Whether applying this event can change what the member list of the
    /// given active channel/guild displays.
    pub fn touches_member_list(&self, active_guild: Option<u64>, active_channel: Option<u64>) -> bool {
        use FetchEvent::*;

        match self {
            // profile changes affect rows in whatever list is shown
            ProfileUpdated { .. } => active_channel.is_some(),
            JoinedMember { guild_id, .. }
            | LeftMember { guild_id, .. }
            | UserRolesUpdated { guild_id, .. }
            | RoleCreated { guild_id, .. }
            | RoleUpdated { guild_id, .. }
            | RoleMoved { guild_id, .. }
            | RoleDeleted { guild_id, .. } => active_guild == Some(*guild_id),
            ThreadMembersUpdated { channel_id, .. } | ChannelDeleted { channel_id, .. } => {
                active_channel == Some(*channel_id)
            }
            GuildRemovedFromList { guild_id } => active_guild == Some(*guild_id),
            GuildAddedToList { .. } | GuildUpdated { .. } | ChannelCreated { .. } | InitialSyncComplete => false,
        }
    }
}

/// Cached chat-service state, fed by [`FetchEvent`]s and queried read-only
/// by the UI through the accessor methods (and the [`CacheView`] trait for
/// the member list).
pub struct Cache {
    users: Members,
    guilds: Guilds,
    channels: Channels,
    initial_sync_complete: bool,
    event_receiver: EventReceiver,
}

impl Cache {
    pub fn new(event_receiver: EventReceiver) -> Self {
        Self {
            users: Default::default(),
            guilds: Default::default(),
            channels: Default::default(),
            initial_sync_complete: false,
            event_receiver,
        }
    }

    /// Drains and applies all queued events. `event_fn` sees each event
    /// first and can swallow it by returning `None`.
    pub fn maintain(&mut self, mut event_fn: impl FnMut(FetchEvent) -> Option<FetchEvent>) {
        while let Ok(ev) = self.event_receiver.try_recv() {
            if let Some(ev) = event_fn(ev) {
                self.process_event(ev);
            }
        }
    }

    fn get_guild_mut(&mut self, guild_id: u64) -> &mut Guild {
        self.guilds.entry(guild_id).or_default()
    }

    fn get_user_mut(&mut self, user_id: u64) -> &mut Member {
        self.users.entry(user_id).or_default()
    }

    pub fn is_initial_sync_complete(&self) -> bool {
        self.initial_sync_complete
    }

    pub fn get_guild(&self, guild_id: u64) -> Option<&Guild> {
        self.guilds.get(&guild_id)
    }

    pub fn get_guilds(&self) -> impl Iterator<Item = (u64, &Guild)> + '_ {
        self.guilds.iter().map(|(id, g)| (*id, g))
    }

    pub fn get_channel(&self, channel_id: u64) -> Option<&Channel> {
        self.channels.get(&channel_id)
    }

    pub fn get_channels(&self, guild_id: u64) -> Vec<(u64, &Channel)> {
        let ids = if let Some(g) = self.get_guild(guild_id) {
            g.channels.as_slice()
        } else {
            return Vec::new();
        };
        let mut channels = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(chan) = self.channels.get(id) {
                channels.push((*id, chan));
            }
        }
        channels
    }

    pub fn get_user(&self, user_id: u64) -> Option<&Member> {
        self.users.get(&user_id)
    }

    pub fn get_dm_channels(&self) -> impl Iterator<Item = (u64, &Channel)> + '_ {
        self.channels
            .iter()
            .filter(|(_, chan)| chan.is_dm())
            .map(|(id, chan)| (*id, chan))
    }

    pub fn process_event(&mut self, event: FetchEvent) {
        match event {
            FetchEvent::ProfileUpdated {
                user_id,
                new_username,
                new_avatar,
                new_deleted,
            } => {
                let user = self.get_user_mut(user_id);
                if let Some(username) = new_username {
                    user.username = username.into();
                }
                if let Some(avatar) = new_avatar {
                    // an empty id means the avatar was unset
                    user.avatar = (!avatar.is_empty()).then(|| avatar.into());
                }
                if let Some(deleted) = new_deleted {
                    user.deleted = deleted;
                }
            }
            FetchEvent::GuildAddedToList { guild_id, name } => {
                let guild = self.get_guild_mut(guild_id);
                guild.name = name;
            }
            FetchEvent::GuildUpdated { guild_id, new_name } => {
                if let Some(name) = new_name {
                    self.get_guild_mut(guild_id).name = name;
                }
            }
            FetchEvent::GuildRemovedFromList { guild_id } => {
                self.guilds.remove(&guild_id);
                self.channels.retain(|_, chan| chan.guild_id != Some(guild_id));
            }
            FetchEvent::JoinedMember { guild_id, member_id } => {
                if member_id == 0 {
                    return;
                }
                self.get_guild_mut(guild_id).members.insert(member_id, Vec::new());
            }
            FetchEvent::LeftMember { guild_id, member_id } => {
                self.get_guild_mut(guild_id).members.remove(&member_id);
            }
            FetchEvent::UserRolesUpdated {
                guild_id,
                user_id,
                new_role_ids,
            } => {
                self.get_guild_mut(guild_id).members.insert(user_id, new_role_ids);
            }
            FetchEvent::RoleCreated {
                guild_id,
                role_id,
                name,
                color,
                hoist,
                position,
            } => {
                self.get_guild_mut(guild_id).roles.insert(
                    role_id,
                    Role {
                        name: name.into(),
                        color: role::decode_color(color),
                        hoist,
                        position,
                    },
                );
            }
            FetchEvent::RoleUpdated {
                guild_id,
                role_id,
                new_name,
                new_color,
                new_hoist,
            } => {
                if let Some(role) = self.get_guild_mut(guild_id).roles.get_mut(&role_id) {
                    if let Some(name) = new_name {
                        role.name = name.into();
                    }
                    if let Some(color) = new_color {
                        role.color = role::decode_color(color);
                    }
                    if let Some(hoist) = new_hoist {
                        role.hoist = hoist;
                    }
                }
            }
            FetchEvent::RoleMoved {
                guild_id,
                role_id,
                new_position,
            } => {
                self.get_guild_mut(guild_id).update_role_position(role_id, new_position);
            }
            FetchEvent::RoleDeleted { guild_id, role_id } => {
                self.get_guild_mut(guild_id).remove_role(role_id);
            }
            FetchEvent::ChannelCreated {
                guild_id,
                channel_id,
                name,
                kind,
            } => {
                self.channels.insert(
                    channel_id,
                    Channel {
                        name: name.into(),
                        guild_id,
                        kind,
                    },
                );
                if let Some(guild_id) = guild_id {
                    let guild = self.get_guild_mut(guild_id);
                    if !guild.channels.contains(&channel_id) {
                        guild.channels.push(channel_id);
                    }
                }
            }
            FetchEvent::ChannelDeleted { guild_id, channel_id } => {
                self.channels.remove(&channel_id);
                if let Some(guild_id) = guild_id {
                    self.get_guild_mut(guild_id).channels.retain(|id| *id != channel_id);
                }
            }
            FetchEvent::ThreadMembersUpdated { channel_id, members } => {
                match self.channels.get_mut(&channel_id).map(|chan| &mut chan.kind) {
                    Some(ChannelKind::Thread { members: current, .. }) => *current = members,
                    _ => tracing::debug!("thread member update for non-thread channel {}", channel_id),
                }
            }
            FetchEvent::InitialSyncComplete => {
                self.initial_sync_complete = true;
            }
        }
    }
}

impl CacheView for Cache {
    fn channel(&self, channel_id: u64) -> Option<&Channel> {
        self.get_channel(channel_id)
    }

    fn guild(&self, guild_id: u64) -> Option<&Guild> {
        self.get_guild(guild_id)
    }

    fn user(&self, user_id: u64) -> Option<&Member> {
        self.get_user(user_id)
    }

    fn users_in_guild(&self, guild_id: u64) -> Vec<u64> {
        self.get_guild(guild_id)
            .map(|guild| guild.members.keys().copied().collect())
            .unwrap_or_default()
    }

    fn users_in_thread(&self, channel_id: u64) -> Vec<u64> {
        match self.get_channel(channel_id).map(|chan| &chan.kind) {
            Some(ChannelKind::Thread { members, .. }) => members.clone(),
            _ => Vec::new(),
        }
    }

    fn hoisted_role(&self, guild_id: u64, user_id: u64, color_only: bool) -> Option<u64> {
        self.get_guild(guild_id)?.hoisted_role(user_id, color_only)
    }

    fn role(&self, guild_id: u64, role_id: u64) -> Option<&Role> {
        self.get_guild(guild_id)?.roles.get(&role_id)
    }
}

/// Handle to the homeserver the shell talks to. The actual gateway/session
/// machinery lives in the protocol collaborator; this side only needs to
/// derive media URLs from cached ids.
#[derive(Clone)]
pub struct Client {
    homeserver: SmolStr,
}

impl Debug for Client {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Client").field("homeserver", &self.homeserver).finish()
    }
}

impl Client {
    pub fn new(homeserver: impl Into<SmolStr>) -> Self {
        Self {
            homeserver: homeserver.into(),
        }
    }

    #[inline]
    pub fn homeserver(&self) -> &str {
        self.homeserver.trim_end_matches('/')
    }

    /// URL an avatar can be downloaded from, scaled server-side.
    pub fn avatar_url(&self, user_id: u64, avatar: &str, size: u32) -> String {
        format!(
            "{}/_accord/media/avatars/{}/{}?size={}",
            self.homeserver(),
            user_id,
            urlencoding::encode(avatar),
            size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_sender() -> (EventSender, Cache) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (tx, Cache::new(rx))
    }

    #[test]
    fn maintain_applies_queued_events_in_order() {
        let (tx, mut cache) = cache_with_sender();

        tx.send(FetchEvent::GuildAddedToList {
            guild_id: 1,
            name: "g".to_string(),
        })
        .unwrap();
        tx.send(FetchEvent::JoinedMember {
            guild_id: 1,
            member_id: 7,
        })
        .unwrap();
        tx.send(FetchEvent::ProfileUpdated {
            user_id: 7,
            new_username: Some("eve".to_string()),
            new_avatar: Some("av".to_string()),
            new_deleted: None,
        })
        .unwrap();

        cache.maintain(Some);

        assert!(cache.get_guild(1).unwrap().members.contains_key(&7));
        let user = cache.get_user(7).unwrap();
        assert_eq!(user.username, "eve");
        assert_eq!(user.avatar.as_deref(), Some("av"));
    }

    #[test]
    fn maintain_lets_the_filter_swallow_events() {
        let (tx, mut cache) = cache_with_sender();
        tx.send(FetchEvent::InitialSyncComplete).unwrap();
        cache.maintain(|_| None);
        assert!(!cache.is_initial_sync_complete());
    }

    #[test]
    fn role_lifecycle_events() {
        let (_tx, mut cache) = cache_with_sender();

        cache.process_event(FetchEvent::RoleCreated {
            guild_id: 1,
            role_id: 5,
            name: "staff".to_string(),
            color: 0x00ff00,
            hoist: true,
            position: 3,
        });
        cache.process_event(FetchEvent::UserRolesUpdated {
            guild_id: 1,
            user_id: 7,
            new_role_ids: vec![5],
        });
        assert_eq!(cache.hoisted_role(1, 7, false), Some(5));
        assert_eq!(cache.role(1, 5).unwrap().color, Some([0, 255, 0]));

        cache.process_event(FetchEvent::RoleMoved {
            guild_id: 1,
            role_id: 5,
            new_position: 9,
        });
        assert_eq!(cache.role(1, 5).unwrap().position, 9);

        cache.process_event(FetchEvent::RoleDeleted { guild_id: 1, role_id: 5 });
        assert_eq!(cache.hoisted_role(1, 7, false), None);
        assert!(cache.get_guild(1).unwrap().members.get(&7).unwrap().is_empty());
    }

    #[test]
    fn channel_events_keep_guild_listing_consistent() {
        let (_tx, mut cache) = cache_with_sender();

        cache.process_event(FetchEvent::ChannelCreated {
            guild_id: Some(1),
            channel_id: 10,
            name: "general".to_string(),
            kind: ChannelKind::Text,
        });
        assert_eq!(cache.get_channels(1).len(), 1);

        cache.process_event(FetchEvent::ChannelDeleted {
            guild_id: Some(1),
            channel_id: 10,
        });
        assert!(cache.get_channel(10).is_none());
        assert!(cache.get_channels(1).is_empty());
    }

    #[test]
    fn avatar_url_encodes_the_media_id() {
        let client = Client::new("https://chat.example.org/");
        assert_eq!(
            client.avatar_url(7, "a b", 16),
            "https://chat.example.org/_accord/media/avatars/7/a%20b?size=16"
        );
    }
}
