use ahash::AHashMap;
use smol_str::SmolStr;

pub type Members = AHashMap<u64, Member>;

/// A user profile as known to the cache. A profile may exist before it is
/// fetched (eg. because a guild listed the user id), in which case all
/// fields are defaults until a profile update event arrives.
#[derive(Debug, Clone, Default)]
pub struct Member {
    pub username: SmolStr,
    /// Media id the avatar can be downloaded by. `None` means the user has
    /// no avatar and the placeholder is shown instead.
    pub avatar: Option<SmolStr>,
    /// Deleted accounts stay in the cache so old references keep resolving,
    /// but they are skipped everywhere they would be displayed.
    pub deleted: bool,
}
