//! Shelf packing for one aspect class of a surface's atlas.
//!
//! A row owns a growing list of square pages. Each page is cut into
//! horizontal shelves; each shelf into cells laid out left to right.
//! Released cells stay on their shelf and are handed out again first.

use bitvec::prelude::{BitVec, Lsb0};
use paint_protocol::{AtlasRegion, GpuContext, TextureHandle};

use crate::FreezerError;
use crate::slot::AspectClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RowPlacement {
    pub(crate) page: usize,
    pub(crate) shelf: usize,
    pub(crate) cell: usize,
    pub(crate) texture: TextureHandle,
    pub(crate) region: AtlasRegion,
}

#[derive(Debug)]
struct Cell {
    x: u32,
    width: u32,
}

#[derive(Debug)]
struct Shelf {
    y: u32,
    height: u32,
    next_x: u32,
    cells: Vec<Cell>,
    occupied: BitVec<usize, Lsb0>,
}

impl Shelf {
    fn new(y: u32, height: u32) -> Self {
        Self {
            y,
            height,
            next_x: 0,
            cells: Vec::new(),
            occupied: BitVec::new(),
        }
    }

    fn reuse(&mut self, width: u32, height: u32) -> Option<usize> {
        if height > self.height {
            return None;
        }
        let index = self
            .occupied
            .iter_zeros()
            .find(|&index| self.cells[index].width >= width)?;
        self.occupied.set(index, true);
        Some(index)
    }

    fn append(&mut self, width: u32, height: u32, page_size: u32, margin: u32) -> Option<usize> {
        if height > self.height || self.next_x + width > page_size {
            return None;
        }
        let index = self.cells.len();
        self.cells.push(Cell {
            x: self.next_x,
            width,
        });
        self.occupied.push(true);
        self.next_x = self.next_x + width + margin;
        Some(index)
    }
}

#[derive(Debug)]
struct AtlasPage {
    texture: TextureHandle,
    shelves: Vec<Shelf>,
    next_y: u32,
}

#[derive(Debug)]
pub struct FreezerRow {
    class: AspectClass,
    page_size: u32,
    margin: u32,
    pages: Vec<AtlasPage>,
}

impl FreezerRow {
    pub fn new(class: AspectClass, page_size: u32, margin: u32) -> Self {
        assert!(page_size > 0, "freezer page size must be positive");
        Self {
            class,
            page_size,
            margin,
            pages: Vec::new(),
        }
    }

    pub fn class(&self) -> AspectClass {
        self.class
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_texture(&self, page: usize) -> Option<TextureHandle> {
        self.pages.get(page).map(|page| page.texture)
    }

    pub fn occupied_cells(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|page| page.shelves.iter())
            .map(|shelf| shelf.occupied.count_ones())
            .sum()
    }

    /// First fit over released cells, then shelf tails, then fresh shelves.
    /// A new page is created only when none of those fit.
    pub(crate) fn allocate(
        &mut self,
        gpu: &mut dyn GpuContext,
        width: u32,
        height: u32,
    ) -> Result<RowPlacement, FreezerError> {
        if width == 0 || height == 0 {
            return Err(FreezerError::ZeroSizedSlot);
        }
        if width > self.page_size || height > self.page_size {
            return Err(FreezerError::SlotTooLarge {
                width,
                height,
                page_size: self.page_size,
            });
        }

        for (page_index, page) in self.pages.iter_mut().enumerate() {
            for (shelf_index, shelf) in page.shelves.iter_mut().enumerate() {
                if let Some(cell) = shelf.reuse(width, height) {
                    return Ok(placement(
                        page_index,
                        page.texture,
                        shelf_index,
                        shelf,
                        cell,
                        width,
                        height,
                    ));
                }
            }
        }

        let (page_size, margin) = (self.page_size, self.margin);
        for (page_index, page) in self.pages.iter_mut().enumerate() {
            for (shelf_index, shelf) in page.shelves.iter_mut().enumerate() {
                if let Some(cell) = shelf.append(width, height, page_size, margin) {
                    return Ok(placement(
                        page_index,
                        page.texture,
                        shelf_index,
                        shelf,
                        cell,
                        width,
                        height,
                    ));
                }
            }
            if let Some(placement) = open_shelf(page_index, page, width, height, page_size, margin) {
                return Ok(placement);
            }
        }

        let Some(texture) = gpu.create_texture(self.page_size, self.page_size) else {
            return Err(FreezerError::TextureUnavailable);
        };
        log::debug!(
            "[freezer] growing {:?} row to {} pages of {}px",
            self.class,
            self.pages.len() + 1,
            self.page_size
        );
        let page_index = self.pages.len();
        self.pages.push(AtlasPage {
            texture,
            shelves: Vec::new(),
            next_y: 0,
        });
        let page = &mut self.pages[page_index];
        open_shelf(page_index, page, width, height, page_size, margin)
            .ok_or(FreezerError::SlotTooLarge {
                width,
                height,
                page_size,
            })
    }

    pub(crate) fn release(&mut self, placement: &RowPlacement) -> Result<(), FreezerError> {
        let Some(shelf) = self
            .pages
            .get_mut(placement.page)
            .and_then(|page| page.shelves.get_mut(placement.shelf))
        else {
            return Err(FreezerError::StaleSlot);
        };
        let Some(mut occupied) = shelf.occupied.get_mut(placement.cell) else {
            return Err(FreezerError::StaleSlot);
        };
        if !*occupied {
            return Err(FreezerError::StaleSlot);
        }
        *occupied = false;
        Ok(())
    }
}

fn open_shelf(
    page_index: usize,
    page: &mut AtlasPage,
    width: u32,
    height: u32,
    page_size: u32,
    margin: u32,
) -> Option<RowPlacement> {
    if page.next_y + height > page_size {
        return None;
    }
    let shelf_index = page.shelves.len();
    page.shelves.push(Shelf::new(page.next_y, height));
    page.next_y = page.next_y + height + margin;
    let shelf = &mut page.shelves[shelf_index];
    let cell = shelf.append(width, height, page_size, margin)?;
    Some(placement(
        page_index,
        page.texture,
        shelf_index,
        shelf,
        cell,
        width,
        height,
    ))
}

fn placement(
    page: usize,
    texture: TextureHandle,
    shelf_index: usize,
    shelf: &Shelf,
    cell: usize,
    width: u32,
    height: u32,
) -> RowPlacement {
    RowPlacement {
        page,
        shelf: shelf_index,
        cell,
        texture,
        region: AtlasRegion {
            x: shelf.cells[cell].x,
            y: shelf.y,
            width,
            height,
        },
    }
}
