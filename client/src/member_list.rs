use std::cmp::Reverse;

use ahash::AHashMap;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::{
    channel::{Channel, ChannelKind},
    guild::Guild,
    member::Member,
    role::Role,
    IndexMap,
};

/// Read-only queries into the cached chat-service state, as needed by the
/// member list. `Cache` implements this; tests substitute a fake. A `None`
/// anywhere means "not yet cached" and is never an error.
pub trait CacheView {
    fn channel(&self, channel_id: u64) -> Option<&Channel>;
    fn guild(&self, guild_id: u64) -> Option<&Guild>;
    fn user(&self, user_id: u64) -> Option<&Member>;
    fn users_in_guild(&self, guild_id: u64) -> Vec<u64>;
    fn users_in_thread(&self, channel_id: u64) -> Vec<u64>;
    fn hoisted_role(&self, guild_id: u64, user_id: u64, color_only: bool) -> Option<u64>;
    fn role(&self, guild_id: u64, role_id: u64) -> Option<&Role>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// A hoisted role, keyed by role id.
    Role(u64),
    /// The synthetic trailing group holding members without a hoisted role.
    /// Keyed by guild id, since that is the id the implicit role goes by.
    Everyone(u64),
    /// The single flat group of a direct message channel.
    DirectMessage(u64),
}

#[derive(Debug)]
pub struct MemberGroup<Img> {
    pub key: GroupKey,
    pub label: SmolStr,
    pub members: Vec<MemberRow<Img>>,
}

#[derive(Debug)]
pub struct MemberRow<Img> {
    pub user_id: u64,
    pub name: SmolStr,
    pub color: Option<[u8; 3]>,
    pub avatar: Option<Img>,
    avatar_requested: bool,
}

impl<Img> MemberRow<Img> {
    fn new(user_id: u64, name: SmolStr, color: Option<[u8; 3]>) -> Self {
        Self {
            user_id,
            name,
            color,
            avatar: None,
            avatar_requested: false,
        }
    }
}

/// Location of a row in the current tree. Only valid for the generation it
/// was created in.
#[derive(Debug, Clone, Copy)]
struct RowSlot {
    group: usize,
    row: usize,
}

/// Handed out by [`MemberList::request_avatar`] and passed back with the
/// decoded image. Carries the tree generation so a completion that raced a
/// `clear` can be detected and dropped.
#[derive(Debug, Clone, Copy)]
pub struct AvatarTicket {
    generation: u64,
    slot: RowSlot,
}

#[derive(Debug, Clone)]
pub struct AvatarRequest {
    pub user_id: u64,
    /// Media id to download the avatar by.
    pub avatar: SmolStr,
    pub ticket: AvatarTicket,
}

/// The role-grouped member list view model.
///
/// Owns the group/row tree rendered by the member sidebar. The tree is
/// always rebuilt wholesale: `set_active_channel` followed by `update`
/// discards everything and repopulates from the cache. Within one populated
/// generation only row avatars mutate, in place, through
/// `request_avatar` / `apply_avatar`.
///
/// `Img` is whatever the rendering layer uses as a decoded image handle;
/// this crate never looks inside it.
pub struct MemberList<Img> {
    groups: Vec<MemberGroup<Img>>,
    /// Rows that have not had an avatar request issued yet, by user id.
    /// Entries are removed the first time the row comes up for render.
    pending_avatars: AHashMap<u64, RowSlot>,
    /// Bumped on every clear; stale avatar completions compare against it.
    generation: u64,
    active_channel: Option<u64>,
    active_guild: Option<u64>,
}

impl<Img> Default for MemberList<Img> {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            pending_avatars: AHashMap::new(),
            generation: 0,
            active_channel: None,
            active_guild: None,
        }
    }
}

struct RoleBucket {
    position: i32,
    label: SmolStr,
    members: Vec<PendingRow>,
}

struct PendingRow {
    user_id: u64,
    name: SmolStr,
    color: Option<[u8; 3]>,
}

impl<Img> MemberList<Img> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn groups(&self) -> &[MemberGroup<Img>] {
        &self.groups
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[inline]
    pub fn active_channel(&self) -> Option<u64> {
        self.active_channel
    }

    #[inline]
    pub fn active_guild(&self) -> Option<u64> {
        self.active_guild
    }

    /// Records the channel the list tracks and resolves its owning guild.
    /// The guild is `None` for DM channels and for channels not yet cached.
    /// Does not rebuild; callers follow up with [`Self::update`].
    pub fn set_active_channel(&mut self, cache: &impl CacheView, channel_id: Option<u64>) {
        self.active_channel = channel_id;
        self.active_guild = channel_id
            .and_then(|id| cache.channel(id))
            .and_then(|channel| channel.guild_id);
    }

    /// Empties the tree and the pending avatar index. Any avatar fetch still
    /// in flight keeps running, but its ticket now refers to a dead
    /// generation and its result will be dropped on arrival.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.pending_avatars.clear();
        self.generation += 1;
    }

    /// Clear-then-full-rebuild against the current active channel. With no
    /// channel selected the tree simply stays empty.
    pub fn update(&mut self, cache: &impl CacheView) {
        self.clear();
        self.build(cache);
    }

    fn build(&mut self, cache: &impl CacheView) {
        let Some(channel_id) = self.active_channel else { return };

        let Some(channel) = cache.channel(channel_id) else {
            warn!("attempted to build member list with unfetched channel {}", channel_id);
            return;
        };

        // DM channels have no roles; one flat group of recipients and done.
        if let ChannelKind::DirectMessage { recipients } = &channel.kind {
            let mut rows = recipients
                .iter()
                .filter_map(|id| {
                    cache
                        .user(*id)
                        .map(|user| MemberRow::new(*id, user.username.clone(), None))
                })
                .collect::<Vec<_>>();
            rows.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));

            self.groups.push(MemberGroup {
                key: GroupKey::DirectMessage(channel_id),
                label: channel.name.clone(),
                members: rows,
            });
            return;
        }

        let Some(guild_id) = self.active_guild else { return };
        if cache.guild(guild_id).is_none() {
            return;
        }

        let user_ids = if channel.is_thread() {
            cache.users_in_thread(channel_id)
        } else {
            cache.users_in_guild(guild_id)
        };

        let mut buckets: IndexMap<u64, RoleBucket> = IndexMap::default();
        let mut roleless = Vec::new();

        for user_id in user_ids {
            let Some(user) = cache.user(user_id) else { continue };
            if user.deleted {
                continue;
            }

            let pos_role = cache
                .hoisted_role(guild_id, user_id, false)
                .and_then(|role_id| cache.role(guild_id, role_id).map(|role| (role_id, role)));
            let color = cache
                .hoisted_role(guild_id, user_id, true)
                .and_then(|role_id| cache.role(guild_id, role_id))
                .and_then(|role| role.color);

            match pos_role {
                // No hoisted role, or the role id resolved to nothing; both
                // cases land in the everyone group.
                None => roleless.push(user_id),
                Some((role_id, role)) => {
                    buckets
                        .entry(role_id)
                        .or_insert_with(|| RoleBucket {
                            position: role.position,
                            label: role.name.clone(),
                            members: Vec::new(),
                        })
                        .members
                        .push(PendingRow {
                            user_id,
                            name: user.username.clone(),
                            color,
                        });
                }
            }
        }

        let mut buckets = buckets.into_iter().collect::<Vec<_>>();
        // stable, so roles sharing a position keep their first-seen order
        buckets.sort_by_key(|(_, bucket)| Reverse(bucket.position));

        for (role_id, bucket) in buckets {
            self.push_group(GroupKey::Role(role_id), bucket.label, bucket.members);
        }

        // the everyone group is emitted even when nobody is in it, so the
        // header stays visible
        let roleless_rows = roleless
            .into_iter()
            .filter_map(|user_id| {
                cache.user(user_id).map(|user| PendingRow {
                    user_id,
                    name: user.username.clone(),
                    color: None,
                })
            })
            .collect();
        self.push_group(
            GroupKey::Everyone(guild_id),
            SmolStr::new_inline("@everyone"),
            roleless_rows,
        );

        debug!(
            "built member list for channel {}: {} groups",
            channel_id,
            self.groups.len()
        );
    }

    fn push_group(&mut self, key: GroupKey, label: SmolStr, mut rows: Vec<PendingRow>) {
        rows.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));

        let group = self.groups.len();
        let members = rows
            .into_iter()
            .enumerate()
            .map(|(row, pending)| {
                self.pending_avatars
                    .insert(pending.user_id, RowSlot { group, row });
                MemberRow::new(pending.user_id, pending.name, pending.color)
            })
            .collect();

        self.groups.push(MemberGroup { key, label, members });
    }

    /// Render-time hook, called once per row as it comes up for display.
    /// Returns the fetch to dispatch, at most once per row per tree
    /// lifetime: the row is marked requested before any asynchronous work
    /// happens, so repeated render passes cannot double-fetch. Rows whose
    /// user has no avatar (or is not cached) keep their placeholder.
    pub fn request_avatar(&mut self, cache: &impl CacheView, user_id: u64) -> Option<AvatarRequest> {
        let slot = self.pending_avatars.remove(&user_id)?;
        let row = self.groups.get_mut(slot.group)?.members.get_mut(slot.row)?;
        if row.avatar_requested {
            return None;
        }
        row.avatar_requested = true;

        let avatar = cache.user(user_id)?.avatar.clone()?;
        Some(AvatarRequest {
            user_id,
            avatar,
            ticket: AvatarTicket {
                generation: self.generation,
                slot,
            },
        })
    }

    /// Writes a fetched avatar into its row. Returns false if the tree was
    /// cleared or rebuilt since the request was issued; the image is then
    /// dropped silently, since that race is expected and not a fault.
    pub fn apply_avatar(&mut self, ticket: AvatarTicket, image: Img) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        match self
            .groups
            .get_mut(ticket.slot.group)
            .and_then(|group| group.members.get_mut(ticket.slot.row))
        {
            Some(row) => {
                row.avatar = Some(image);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelKind;

    #[derive(Default)]
    struct FakeCache {
        users: AHashMap<u64, Member>,
        guilds: AHashMap<u64, Guild>,
        channels: AHashMap<u64, Channel>,
    }

    impl CacheView for FakeCache {
        fn channel(&self, channel_id: u64) -> Option<&Channel> {
            self.channels.get(&channel_id)
        }

        fn guild(&self, guild_id: u64) -> Option<&Guild> {
            self.guilds.get(&guild_id)
        }

        fn user(&self, user_id: u64) -> Option<&Member> {
            self.users.get(&user_id)
        }

        fn users_in_guild(&self, guild_id: u64) -> Vec<u64> {
            // ascending ids, so tests have a deterministic input order
            let mut ids = self
                .guilds
                .get(&guild_id)
                .map(|guild| guild.members.keys().copied().collect::<Vec<_>>())
                .unwrap_or_default();
            ids.sort_unstable();
            ids
        }

        fn users_in_thread(&self, channel_id: u64) -> Vec<u64> {
            match self.channels.get(&channel_id).map(|chan| &chan.kind) {
                Some(ChannelKind::Thread { members, .. }) => members.clone(),
                _ => Vec::new(),
            }
        }

        fn hoisted_role(&self, guild_id: u64, user_id: u64, color_only: bool) -> Option<u64> {
            self.guilds.get(&guild_id)?.hoisted_role(user_id, color_only)
        }

        fn role(&self, guild_id: u64, role_id: u64) -> Option<&Role> {
            self.guilds.get(&guild_id)?.roles.get(&role_id)
        }
    }

    const GUILD: u64 = 1000;
    const CHANNEL: u64 = 2000;

    fn user(name: &str) -> Member {
        Member {
            username: name.into(),
            avatar: None,
            deleted: false,
        }
    }

    fn user_with_avatar(name: &str, avatar: &str) -> Member {
        Member {
            username: name.into(),
            avatar: Some(avatar.into()),
            deleted: false,
        }
    }

    fn role(name: &str, position: i32, hoist: bool) -> Role {
        Role {
            name: name.into(),
            position,
            hoist,
            color: None,
        }
    }

    /// Guild with R1(pos 5, hoist), R2(pos 10, hoist), members A->R1,
    /// B->R2, C->roleless; one text channel.
    fn guild_cache() -> FakeCache {
        let mut cache = FakeCache::default();

        let mut guild = Guild {
            name: "test guild".to_string(),
            ..Default::default()
        };
        guild.roles.insert(1, role("R1", 5, true));
        guild.roles.insert(2, role("R2", 10, true));
        guild.members.insert(10, vec![1]);
        guild.members.insert(11, vec![2]);
        guild.members.insert(12, vec![]);
        cache.guilds.insert(GUILD, guild);

        cache.users.insert(10, user("alice"));
        cache.users.insert(11, user("bob"));
        cache.users.insert(12, user("carol"));

        cache.channels.insert(
            CHANNEL,
            Channel {
                name: "general".into(),
                guild_id: Some(GUILD),
                kind: ChannelKind::Text,
            },
        );

        cache
    }

    fn populated(cache: &FakeCache) -> MemberList<u32> {
        let mut list = MemberList::new();
        list.set_active_channel(cache, Some(CHANNEL));
        list.update(cache);
        list
    }

    fn row_names(group: &MemberGroup<u32>) -> Vec<&str> {
        group.members.iter().map(|row| row.name.as_str()).collect()
    }

    #[test]
    fn groups_ordered_by_descending_position_with_everyone_last() {
        let cache = guild_cache();
        let list = populated(&cache);

        let groups = list.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].key, GroupKey::Role(2));
        assert_eq!(row_names(&groups[0]), ["bob"]);
        assert_eq!(groups[1].key, GroupKey::Role(1));
        assert_eq!(row_names(&groups[1]), ["alice"]);
        assert_eq!(groups[2].key, GroupKey::Everyone(GUILD));
        assert_eq!(row_names(&groups[2]), ["carol"]);
    }

    #[test]
    fn everyone_group_emitted_even_when_empty() {
        let mut cache = guild_cache();
        // everyone gets a role now
        cache.guilds.get_mut(&GUILD).unwrap().members.insert(12, vec![1]);

        let list = populated(&cache);
        let last = list.groups().last().unwrap();
        assert_eq!(last.key, GroupKey::Everyone(GUILD));
        assert!(last.members.is_empty());
    }

    #[test]
    fn members_sorted_alphabetically_with_stable_ties() {
        let mut cache = guild_cache();
        {
            let guild = cache.guilds.get_mut(&GUILD).unwrap();
            for id in [20, 21, 22] {
                guild.members.insert(id, vec![2]);
            }
        }
        cache.users.insert(20, user("dup"));
        cache.users.insert(21, user("aaa"));
        cache.users.insert(22, user("dup"));

        let list = populated(&cache);
        let group = &list.groups()[0];
        assert_eq!(group.key, GroupKey::Role(2));
        assert_eq!(row_names(group), ["aaa", "bob", "dup", "dup"]);
        // equal names keep the cache iteration order (ascending ids here)
        let dup_ids = group
            .members
            .iter()
            .filter(|row| row.name == "dup")
            .map(|row| row.user_id)
            .collect::<Vec<_>>();
        assert_eq!(dup_ids, [20, 22]);
    }

    #[test]
    fn group_membership_is_exclusive() {
        let cache = guild_cache();
        let list = populated(&cache);

        for group in list.groups() {
            for row in &group.members {
                let in_everyone = matches!(group.key, GroupKey::Everyone(_));
                let has_role = cache.hoisted_role(GUILD, row.user_id, false).is_some();
                assert_ne!(in_everyone, has_role, "user {} misplaced", row.user_id);
            }
        }
    }

    #[test]
    fn hoisted_role_missing_from_role_table_falls_back_to_everyone() {
        let mut cache = guild_cache();
        // bob's role vanishes from the role table but stays assigned
        cache.guilds.get_mut(&GUILD).unwrap().roles.remove(&2);

        let list = populated(&cache);
        let everyone = list.groups().last().unwrap();
        assert_eq!(row_names(everyone), ["bob", "carol"]);
    }

    #[test]
    fn unresolved_and_deleted_users_are_skipped() {
        let mut cache = guild_cache();
        cache.users.remove(&10);
        cache.users.get_mut(&11).unwrap().deleted = true;

        let list = populated(&cache);
        let all_names = list
            .groups()
            .iter()
            .flat_map(|group| group.members.iter())
            .map(|row| row.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(all_names, ["carol"]);
    }

    #[test]
    fn name_color_comes_from_the_color_role() {
        let mut cache = guild_cache();
        {
            let guild = cache.guilds.get_mut(&GUILD).unwrap();
            // unhoisted but colored, higher than R1
            guild.roles.insert(
                3,
                Role {
                    name: "tint".into(),
                    position: 7,
                    hoist: false,
                    color: Some([10, 20, 30]),
                },
            );
            guild.members.insert(10, vec![1, 3]);
        }

        let list = populated(&cache);
        let alice = &list.groups()[1].members[0];
        assert_eq!(alice.name, "alice");
        assert_eq!(alice.color, Some([10, 20, 30]));
        let bob = &list.groups()[0].members[0];
        assert_eq!(bob.color, None);
    }

    #[test]
    fn dm_channel_produces_single_flat_group() {
        let mut cache = FakeCache::default();
        cache.users.insert(1, user("zoe"));
        cache.users.insert(2, user("amir"));
        cache.channels.insert(
            CHANNEL,
            Channel {
                name: "dm".into(),
                guild_id: None,
                kind: ChannelKind::DirectMessage { recipients: vec![1, 2] },
            },
        );

        let mut list: MemberList<u32> = MemberList::new();
        list.set_active_channel(&cache, Some(CHANNEL));
        assert_eq!(list.active_guild(), None);
        list.update(&cache);

        let groups = list.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, GroupKey::DirectMessage(CHANNEL));
        assert_eq!(row_names(&groups[0]), ["amir", "zoe"]);
    }

    #[test]
    fn thread_channel_uses_participants_only() {
        let mut cache = guild_cache();
        let thread_id = 2001;
        cache.channels.insert(
            thread_id,
            Channel {
                name: "thread".into(),
                guild_id: Some(GUILD),
                kind: ChannelKind::Thread {
                    parent: CHANNEL,
                    members: vec![11],
                },
            },
        );

        let mut list: MemberList<u32> = MemberList::new();
        list.set_active_channel(&cache, Some(thread_id));
        list.update(&cache);

        // bob under R2 plus the (empty) everyone group
        let groups = list.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(row_names(&groups[0]), ["bob"]);
        assert!(groups[1].members.is_empty());
    }

    #[test]
    fn no_active_channel_leaves_tree_empty() {
        let cache = guild_cache();
        let mut list: MemberList<u32> = MemberList::new();
        list.update(&cache);
        assert!(list.is_empty());

        list.set_active_channel(&cache, Some(9999));
        list.update(&cache);
        assert!(list.is_empty());
    }

    #[test]
    fn avatar_requested_at_most_once_per_row() {
        let mut cache = guild_cache();
        cache.users.insert(10, user_with_avatar("alice", "av-alice"));

        let mut list = populated(&cache);
        let req = list.request_avatar(&cache, 10).expect("first render requests");
        assert_eq!(req.user_id, 10);
        assert_eq!(req.avatar, "av-alice");

        // further render passes before completion are no-ops
        assert!(list.request_avatar(&cache, 10).is_none());
        assert!(list.request_avatar(&cache, 10).is_none());
    }

    #[test]
    fn user_without_avatar_keeps_placeholder() {
        let cache = guild_cache();
        let mut list = populated(&cache);

        assert!(list.request_avatar(&cache, 10).is_none());
        // the row was consumed from the pending index regardless
        assert!(list.request_avatar(&cache, 10).is_none());
        let alice = &list.groups()[1].members[0];
        assert!(alice.avatar.is_none());
    }

    #[test]
    fn completed_avatar_is_written_in_place() {
        let mut cache = guild_cache();
        cache.users.insert(10, user_with_avatar("alice", "av-alice"));

        let mut list = populated(&cache);
        let req = list.request_avatar(&cache, 10).unwrap();
        assert!(list.apply_avatar(req.ticket, 77));
        assert_eq!(list.groups()[1].members[0].avatar, Some(77));
    }

    #[test]
    fn stale_avatar_completion_is_dropped_after_clear() {
        let mut cache = guild_cache();
        cache.users.insert(10, user_with_avatar("alice", "av-alice"));

        let mut list = populated(&cache);
        let req = list.request_avatar(&cache, 10).unwrap();

        list.clear();
        assert!(!list.apply_avatar(req.ticket, 77));
        assert!(list.is_empty());

        // same across a full rebuild: the old ticket stays dead
        list.update(&cache);
        assert!(!list.apply_avatar(req.ticket, 77));
        assert!(list.groups()[1].members[0].avatar.is_none());
    }

    #[test]
    fn rebuild_allows_one_new_request_per_row() {
        let mut cache = guild_cache();
        cache.users.insert(10, user_with_avatar("alice", "av-alice"));

        let mut list = populated(&cache);
        assert!(list.request_avatar(&cache, 10).is_some());

        list.update(&cache);
        let req = list.request_avatar(&cache, 10).expect("fresh tree, fresh request");
        assert!(list.apply_avatar(req.ticket, 5));
    }
}
