#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicProperty {
    Broadcast,
    Read,
    WriteWithoutResponse,
    Write,
    AuthenticatedSignedWrites,
    Notify,
    NotifyEncryptionRequired,
    Indicate,
    IndicateEncryptionRequired,
}

impl CharacteristicProperty {
    pub fn is_notifying(&self) -> bool {
        matches!(
            self,
            CharacteristicProperty::Notify
                | CharacteristicProperty::NotifyEncryptionRequired
                | CharacteristicProperty::Indicate
                | CharacteristicProperty::IndicateEncryptionRequired
        )
    }

    pub fn requires_encryption(&self) -> bool {
        matches!(
            self,
            CharacteristicProperty::NotifyEncryptionRequired
                | CharacteristicProperty::IndicateEncryptionRequired
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributePermission {
    Readable,
    Writeable,
    ReadEncryptionRequired,
    WriteEncryptionRequired,
}

impl AttributePermission {
    pub fn requires_encryption(&self) -> bool {
        matches!(
            self,
            AttributePermission::ReadEncryptionRequired
                | AttributePermission::WriteEncryptionRequired
        )
    }
}
