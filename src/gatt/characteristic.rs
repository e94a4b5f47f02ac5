use super::{
    descriptor::Descriptor,
    properties::{AttributePermission, CharacteristicProperty},
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub properties: Vec<CharacteristicProperty>,
    pub permissions: Vec<AttributePermission>,
    pub descriptors: Vec<Descriptor>,
}

impl Characteristic {
    pub fn has_property(&self, property: CharacteristicProperty) -> bool {
        self.properties.contains(&property)
    }

    pub fn has_permission(&self, permission: AttributePermission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn is_encrypted(&self) -> bool {
        self.permissions.iter().any(|p| p.requires_encryption())
    }

    pub fn can_notify(&self) -> bool {
        self.properties.iter().any(|p| p.is_notifying())
    }

    /// Subscribers must be paired before they receive pushed values.
    pub fn notify_requires_encryption(&self) -> bool {
        self.properties.iter().any(|p| p.requires_encryption())
    }
}

impl Default for Characteristic {
    fn default() -> Self {
        Characteristic {
            uuid: Uuid::nil(),
            properties: vec![
                CharacteristicProperty::Read,
                CharacteristicProperty::Write,
                CharacteristicProperty::Notify,
            ],
            permissions: vec![
                AttributePermission::Readable,
                AttributePermission::Writeable,
            ],
            descriptors: vec![Descriptor::client_configuration()],
        }
    }
}
