use paint_protocol::{AtlasRegion, TextureHandle};
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    pub struct FreezerSlotKey;
}

/// Row class a slot is packed into. Wide and square snapshots share the low
/// class, tall ones go to the high class, so shelves of one row hold
/// similarly shaped cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectClass {
    Low,
    High,
}

impl AspectClass {
    pub fn of(width: u32, height: u32) -> Self {
        if height > width { Self::High } else { Self::Low }
    }
}

/// A rectangle of atlas texture handed out to one frozen fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezerSlot {
    pub key: FreezerSlotKey,
    pub class: AspectClass,
    pub page: usize,
    pub texture: TextureHandle,
    pub region: AtlasRegion,
}

#[cfg(test)]
mod tests {
    use super::AspectClass;

    #[test]
    fn square_cells_use_low_aspect_row() {
        assert_eq!(AspectClass::of(64, 64), AspectClass::Low);
        assert_eq!(AspectClass::of(128, 16), AspectClass::Low);
        assert_eq!(AspectClass::of(16, 128), AspectClass::High);
    }
}
