use ahash::AHashMap;

use crate::role::Roles;

pub type Guilds = AHashMap<u64, Guild>;

#[derive(Debug, Clone, Default)]
pub struct Guild {
    pub name: String,
    /// Channel ids in display order.
    pub channels: Vec<u64>,
    pub roles: Roles,
    /// Guild membership: user id to the role ids assigned to that user.
    pub members: AHashMap<u64, Vec<u64>>,
}

impl Guild {
    /// Resolves the role that determines where a member is displayed.
    ///
    /// With `color_only` false this is the highest positioned role the user
    /// has that is marked hoisted (used for grouping in the member list).
    /// With `color_only` true it is the highest positioned role with a color
    /// set (used for the name color), which may well be a different role.
    pub fn hoisted_role(&self, user_id: u64, color_only: bool) -> Option<u64> {
        let role_ids = self.members.get(&user_id)?;
        role_ids
            .iter()
            .filter_map(|id| self.roles.get(id).map(|role| (*id, role)))
            .filter(|(_, role)| if color_only { role.color.is_some() } else { role.hoist })
            .max_by_key(|(_, role)| role.position)
            .map(|(id, _)| id)
    }

    pub fn update_role_position(&mut self, role_id: u64, new_position: i32) {
        if let Some(role) = self.roles.get_mut(&role_id) {
            role.position = new_position;
        }
    }

    pub fn remove_role(&mut self, role_id: u64) {
        self.roles.remove(&role_id);
        for role_ids in self.members.values_mut() {
            role_ids.retain(|id| *id != role_id);
        }
    }
}
