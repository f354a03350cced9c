//! Group directory: who belongs to which household.

use std::sync::Arc;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ChoreError, Result};
use crate::models::{fields, GroupKey, Member, MemberColor};
use crate::storage::{DocumentStore, USERS};

/// Resolves users to households and lists household members.
#[derive(Clone)]
pub struct GroupDirectory {
    backend: Arc<dyn DocumentStore>,
}

impl GroupDirectory {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    /// Creates or updates a profile, keeping any existing group membership.
    pub fn register(&self, user_id: &str, name: &str, color: MemberColor) -> Result<Member> {
        let group_key = self.member(user_id).ok().and_then(|m| m.group_key);
        let member = Member {
            id: user_id.to_string(),
            name: name.to_string(),
            color,
            group_key,
        };
        self.backend.upsert(USERS, user_id, member.to_document()?)?;
        debug!(user = user_id, "member registered");
        Ok(member)
    }

    pub fn member(&self, user_id: &str) -> Result<Member> {
        self.backend
            .get(USERS, user_id)?
            .map(|doc| Member::from_document(user_id, &doc))
            .ok_or_else(|| ChoreError::not_found(USERS, user_id))
    }

    /// The household a user currently belongs to.
    pub fn group_of(&self, user_id: &str) -> Result<GroupKey> {
        self.member(user_id)?
            .group_key
            .ok_or_else(|| ChoreError::NoGroup(user_id.to_string()))
    }

    /// Starts a new household with a fresh six-digit key and moves the user
    /// into it.
    pub fn create_group(&self, user_id: &str) -> Result<GroupKey> {
        let key = loop {
            let candidate = GroupKey(rand::thread_rng().gen_range(100_000..1_000_000));
            if self.member_count(candidate)? == 0 {
                break candidate;
            }
        };
        self.join_group(user_id, key)?;
        info!(user = user_id, group = %key, "group created");
        Ok(key)
    }

    /// Moves a user into `key`, leaving any previous household.
    pub fn join_group(&self, user_id: &str, key: GroupKey) -> Result<()> {
        self.backend.update(USERS, user_id, &mut |doc| {
            doc.insert(fields::GROUP_KEY.into(), Value::from(key.0));
            Ok(())
        })?;
        info!(user = user_id, group = %key, "joined group");
        Ok(())
    }

    pub fn leave_group(&self, user_id: &str) -> Result<()> {
        self.backend.update(USERS, user_id, &mut |doc| {
            doc.remove(fields::GROUP_KEY);
            Ok(())
        })?;
        info!(user = user_id, "left group");
        Ok(())
    }

    pub fn set_color(&self, user_id: &str, color: MemberColor) -> Result<()> {
        self.backend.update(USERS, user_id, &mut |doc| {
            doc.insert(fields::MEMBER_COLOR.into(), Value::from(color.as_str()));
            Ok(())
        })
    }

    /// Members of a household, ordered by display name.
    pub fn members(&self, key: GroupKey) -> Result<Vec<Member>> {
        let mut members: Vec<Member> = self
            .backend
            .query_eq(USERS, fields::GROUP_KEY, &Value::from(key.0))?
            .iter()
            .map(|(id, doc)| Member::from_document(id, doc))
            .collect();
        members.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then_with(|| a.id.cmp(&b.id)));
        Ok(members)
    }

    pub fn member_count(&self, key: GroupKey) -> Result<usize> {
        Ok(self.members(key)?.len())
    }

    /// Display name for a user, falling back to the id for unknown users.
    pub fn display_name(&self, user_id: &str) -> String {
        self.member(user_id)
            .map(|m| m.name)
            .unwrap_or_else(|_| user_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn directory() -> GroupDirectory {
        GroupDirectory::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn unregistered_user_has_no_group() {
        let dir = directory();
        assert!(matches!(dir.group_of("ghost"), Err(ChoreError::NotFound { .. })));
        dir.register("ann", "Ann", MemberColor::Blue).unwrap();
        assert!(matches!(dir.group_of("ann"), Err(ChoreError::NoGroup(_))));
    }

    #[test]
    fn create_and_join_group() {
        let dir = directory();
        dir.register("ann", "Ann", MemberColor::Blue).unwrap();
        dir.register("bob", "Bob", MemberColor::Red).unwrap();
        let key = dir.create_group("ann").unwrap();
        assert!((100_000..1_000_000).contains(&key.0));
        dir.join_group("bob", key).unwrap();

        let members = dir.members(key).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "Ann");
        assert_eq!(members[1].color, MemberColor::Red);
        assert_eq!(dir.group_of("bob").unwrap(), key);
    }

    #[test]
    fn new_groups_get_distinct_six_digit_keys() {
        let dir = directory();
        let mut keys = Vec::new();
        for i in 0..20 {
            let user = format!("u{}", i);
            dir.register(&user, &user, MemberColor::Gray).unwrap();
            let key = dir.create_group(&user).unwrap();
            assert!((100_000..1_000_000).contains(&key.0));
            assert!(!keys.contains(&key));
            keys.push(key);
        }
    }

    #[test]
    fn reregister_keeps_group() {
        let dir = directory();
        dir.register("ann", "Ann", MemberColor::Blue).unwrap();
        let key = dir.create_group("ann").unwrap();
        dir.register("ann", "Annie", MemberColor::Green).unwrap();
        assert_eq!(dir.group_of("ann").unwrap(), key);
        assert_eq!(dir.display_name("ann"), "Annie");
    }

    #[test]
    fn leaving_removes_from_members() {
        let dir = directory();
        dir.register("ann", "Ann", MemberColor::Blue).unwrap();
        let key = dir.create_group("ann").unwrap();
        dir.leave_group("ann").unwrap();
        assert_eq!(dir.member_count(key).unwrap(), 0);
        assert_eq!(dir.display_name("nobody"), "nobody");
    }
}
