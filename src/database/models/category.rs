use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Resource;
use crate::schema::EntityKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl Resource for Category {
    const KIND: EntityKind = EntityKind::Category;

    fn id(&self) -> Uuid {
        self.id
    }
}
