use ahash::AHashMap;
use smol_str::SmolStr;

pub type Channels = AHashMap<u64, Channel>;

#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub name: SmolStr,
    /// `None` for direct message channels, which belong to no guild.
    pub guild_id: Option<u64>,
    pub kind: ChannelKind,
}

#[derive(Debug, Clone)]
pub enum ChannelKind {
    Text,
    Category,
    DirectMessage {
        recipients: Vec<u64>,
    },
    Thread {
        parent: u64,
        /// Users participating in the thread. Unlike guild membership this
        /// is tracked per channel, synced by thread participant events.
        members: Vec<u64>,
    },
}

impl Default for ChannelKind {
    fn default() -> Self {
        ChannelKind::Text
    }
}

impl Channel {
    #[inline]
    pub fn is_dm(&self) -> bool {
        matches!(self.kind, ChannelKind::DirectMessage { .. })
    }

    #[inline]
    pub fn is_thread(&self) -> bool {
        matches!(self.kind, ChannelKind::Thread { .. })
    }
}
