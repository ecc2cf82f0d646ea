use paint_protocol::{FramebufferHandle, GpuContext, ProgramHandle, RenderbufferHandle, SurfaceId};
use slotmap::SlotMap;

use crate::FreezerError;
use crate::row::{FreezerRow, RowPlacement};
use crate::slot::{AspectClass, FreezerSlot, FreezerSlotKey};

/// GPU objects shared by every offscreen pass into one surface's atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffscreenObjects {
    pub framebuffer: FramebufferHandle,
    pub renderbuffer: RenderbufferHandle,
    pub program: ProgramHandle,
}

#[derive(Debug, Clone, Copy)]
struct SlotEntry {
    class: AspectClass,
    placement: RowPlacement,
}

/// One surface's atlas: a low and a high aspect row plus the GPU objects
/// used to paint into and blit out of them.
#[derive(Debug)]
pub struct FreezerSlice {
    surface: SurfaceId,
    low_aspect: FreezerRow,
    high_aspect: FreezerRow,
    slots: SlotMap<FreezerSlotKey, SlotEntry>,
    objects: Option<OffscreenObjects>,
}

impl FreezerSlice {
    pub fn new(surface: SurfaceId, page_size: u32, margin: u32) -> Self {
        Self {
            surface,
            low_aspect: FreezerRow::new(AspectClass::Low, page_size, margin),
            high_aspect: FreezerRow::new(AspectClass::High, page_size, margin),
            slots: SlotMap::with_key(),
            objects: None,
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn page_size(&self) -> u32 {
        self.low_aspect.page_size()
    }

    pub fn row(&self, class: AspectClass) -> &FreezerRow {
        match class {
            AspectClass::Low => &self.low_aspect,
            AspectClass::High => &self.high_aspect,
        }
    }

    fn row_mut(&mut self, class: AspectClass) -> &mut FreezerRow {
        match class {
            AspectClass::Low => &mut self.low_aspect,
            AspectClass::High => &mut self.high_aspect,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, key: FreezerSlotKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn allocate(
        &mut self,
        gpu: &mut dyn GpuContext,
        width: u32,
        height: u32,
    ) -> Result<FreezerSlot, FreezerError> {
        let class = AspectClass::of(width, height);
        let placement = self.row_mut(class).allocate(gpu, width, height)?;
        let key = self.slots.insert(SlotEntry { class, placement });
        log::trace!(
            "[freezer] surface {} slot {:?} at page {} {:?}",
            self.surface.raw(),
            key,
            placement.page,
            placement.region
        );
        Ok(FreezerSlot {
            key,
            class,
            page: placement.page,
            texture: placement.texture,
            region: placement.region,
        })
    }

    pub fn release(&mut self, key: FreezerSlotKey) -> Result<(), FreezerError> {
        let Some(entry) = self.slots.remove(key) else {
            return Err(FreezerError::StaleSlot);
        };
        self.row_mut(entry.class).release(&entry.placement)
    }

    pub fn objects(&self) -> Option<OffscreenObjects> {
        self.objects
    }

    /// Creates the framebuffer, renderbuffer and blit program on first use.
    pub fn ensure_objects(
        &mut self,
        gpu: &mut dyn GpuContext,
    ) -> Result<OffscreenObjects, FreezerError> {
        if let Some(objects) = self.objects {
            return Ok(objects);
        }
        let page_size = self.page_size();
        let framebuffer = gpu
            .create_framebuffer()
            .ok_or(FreezerError::GpuObjectUnavailable)?;
        let renderbuffer = gpu
            .create_renderbuffer(page_size, page_size)
            .ok_or(FreezerError::GpuObjectUnavailable)?;
        let program = gpu
            .create_blit_program()
            .ok_or(FreezerError::GpuObjectUnavailable)?;
        let objects = OffscreenObjects {
            framebuffer,
            renderbuffer,
            program,
        };
        self.objects = Some(objects);
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use paint_protocol::testing::RecordingGpu;

    use super::*;

    #[test]
    fn routes_slots_to_rows_by_aspect() {
        let mut gpu = RecordingGpu::default();
        let mut slice = FreezerSlice::new(SurfaceId::new(1), 128, 0);

        let wide = slice.allocate(&mut gpu, 100, 20).unwrap();
        let tall = slice.allocate(&mut gpu, 20, 100).unwrap();

        assert_eq!(wide.class, AspectClass::Low);
        assert_eq!(tall.class, AspectClass::High);
        assert_eq!(slice.row(AspectClass::Low).page_count(), 1);
        assert_eq!(slice.row(AspectClass::High).page_count(), 1);
        assert_ne!(wide.texture, tall.texture);
    }

    #[test]
    fn released_key_becomes_stale() {
        let mut gpu = RecordingGpu::default();
        let mut slice = FreezerSlice::new(SurfaceId::new(1), 128, 0);
        let slot = slice.allocate(&mut gpu, 10, 10).unwrap();

        slice.release(slot.key).unwrap();

        assert!(!slice.contains(slot.key));
        assert_eq!(slice.release(slot.key), Err(FreezerError::StaleSlot));
        let next = slice.allocate(&mut gpu, 10, 10).unwrap();
        assert_ne!(next.key, slot.key);
    }

    #[test]
    fn offscreen_objects_are_created_once() {
        let mut gpu = RecordingGpu::default();
        let mut slice = FreezerSlice::new(SurfaceId::new(1), 128, 0);
        let first = slice.ensure_objects(&mut gpu).unwrap();
        let second = slice.ensure_objects(&mut gpu).unwrap();
        assert_eq!(first, second);
        assert_eq!(gpu.framebuffers_created, 1);
        assert_eq!(gpu.programs_created, 1);
    }
}
