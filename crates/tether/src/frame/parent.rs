use serde::{Deserialize, Serialize};

pub const NO_SLOT: i32 = -1;

/// Identifies a moving platform by the networked object that owns it and the
/// platform slot on that object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub owner_id: u32,
    pub slot_index: i32,
}

impl ParentRef {
    pub const NONE: Self = Self {
        owner_id: 0,
        slot_index: NO_SLOT,
    };

    pub fn new(owner_id: u32, slot_index: i32) -> Self {
        Self {
            owner_id,
            slot_index,
        }
    }

    /// Owner id 0 and slot -1 both mean "not riding anything".
    #[inline]
    pub fn is_none(&self) -> bool {
        self.owner_id == 0 || self.slot_index == NO_SLOT
    }

    #[inline]
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    pub fn as_option(self) -> Option<Self> {
        if self.is_none() { None } else { Some(self) }
    }
}

impl Default for ParentRef {
    fn default() -> Self {
        Self::NONE
    }
}
