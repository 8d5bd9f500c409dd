use std::collections::{BTreeMap, HashMap};

use citymine_core::types::{Address, User, UserId};
use serde::{Deserialize, Serialize};

/// One-to-one mapping between principals and sequence ids.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UserRegistry {
    ids: HashMap<Address, UserId>,
    principals: BTreeMap<UserId, Address>,
    last_id: UserId,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_of(&self, principal: &Address) -> Option<UserId> {
        self.ids.get(principal).copied()
    }

    pub fn principal_of(&self, id: UserId) -> Option<&Address> {
        self.principals.get(&id)
    }

    pub fn user(&self, id: UserId) -> Option<User> {
        self.principal_of(id).map(|p| User { id, principal: p.clone() })
    }

    pub fn contains_id(&self, id: UserId) -> bool {
        self.principals.contains_key(&id)
    }

    /// Highest id handed out so far (0 when empty).
    pub fn last_id(&self) -> UserId {
        self.last_id
    }

    /// Existing id, or the next sequence id bound to `principal`.
    pub fn get_or_create(&mut self, principal: &Address) -> UserId {
        if let Some(id) = self.id_of(principal) {
            return id;
        }
        self.last_id += 1;
        let id = self.last_id;
        self.ids.insert(principal.clone(), id);
        self.principals.insert(id, principal.clone());
        id
    }
}
