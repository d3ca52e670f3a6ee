use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Resource;
use crate::schema::EntityKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

impl Resource for Tag {
    const KIND: EntityKind = EntityKind::Tag;

    fn id(&self) -> Uuid {
        self.id
    }
}
