use std::sync::Arc;

use super::error::{RecordError, RecordResult};
use super::schema::TupleDesc;
use super::tuple::{RecordId, SlotId, Tuple};
use crate::file::{PAGE_SIZE, PageId};

/// Geometry of a slotted page: `[header][presence bitmap][slot 0][slot 1]...`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    header_len: usize,
    slot_size: usize,
    slot_count: usize,
}

impl SlotLayout {
    /// Calculate maximum number of slots for a given slot size.
    ///
    /// Each slot costs `slot_size * 8` bits of data plus one presence bit,
    /// so `slot_count = floor(available_bits / (slot_size * 8 + 1))`.
    pub fn calculate_slot_count(header_len: usize, slot_size: usize) -> usize {
        if slot_size == 0 || header_len >= PAGE_SIZE {
            return 0;
        }
        ((PAGE_SIZE - header_len) * 8) / (slot_size * 8 + 1)
    }

    pub fn new(header_len: usize, slot_size: usize) -> RecordResult<Self> {
        let slot_count = Self::calculate_slot_count(header_len, slot_size);
        if slot_count == 0 {
            return Err(RecordError::TupleTooLarge(slot_size));
        }
        Ok(Self {
            header_len,
            slot_size,
            slot_count,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn bitmap_len(&self) -> usize {
        self.slot_count.div_ceil(8)
    }

    fn slot_range(&self, slot: SlotId) -> std::ops::Range<usize> {
        let start = self.header_len + self.bitmap_len() + slot * self.slot_size;
        start..start + self.slot_size
    }
}

/// Zero-copy view over a page buffer laid out by a [`SlotLayout`].
///
/// Works over `&[u8]` for reads and `&mut [u8]` for writes, so it can wrap
/// buffer pool memory directly.
pub struct SlottedPage<B> {
    buffer: B,
    layout: SlotLayout,
}

impl<B: AsRef<[u8]>> SlottedPage<B> {
    /// Wrap a page buffer, which must be exactly `PAGE_SIZE` bytes
    pub fn new(buffer: B, layout: SlotLayout) -> RecordResult<Self> {
        let len = buffer.as_ref().len();
        if len != PAGE_SIZE {
            return Err(RecordError::Deserialization(format!(
                "Invalid page size: {} bytes",
                len
            )));
        }
        Ok(Self { buffer, layout })
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub fn header(&self) -> &[u8] {
        &self.buffer.as_ref()[..self.layout.header_len]
    }

    /// Check if a slot is used
    pub fn is_slot_used(&self, slot: SlotId) -> bool {
        if slot >= self.layout.slot_count {
            return false;
        }
        let byte = self.buffer.as_ref()[self.layout.header_len + slot / 8];
        byte & (1 << (slot % 8)) != 0
    }

    /// Find the first free slot, returns None if the page is full
    pub fn find_free_slot(&self) -> Option<SlotId> {
        (0..self.layout.slot_count).find(|&slot| !self.is_slot_used(slot))
    }

    /// Occupied slots in ascending order
    pub fn used_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        (0..self.layout.slot_count).filter(move |&slot| self.is_slot_used(slot))
    }

    pub fn used_count(&self) -> usize {
        self.used_slots().count()
    }

    /// Raw bytes of a slot, whether or not it is occupied
    pub fn slot_bytes(&self, slot: SlotId) -> &[u8] {
        &self.buffer.as_ref()[self.layout.slot_range(slot)]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> SlottedPage<B> {
    pub fn header_mut(&mut self) -> &mut [u8] {
        let len = self.layout.header_len;
        &mut self.buffer.as_mut()[..len]
    }

    pub fn set_slot_used(&mut self, slot: SlotId, used: bool) {
        let idx = self.layout.header_len + slot / 8;
        let mask = 1 << (slot % 8);
        let buffer = self.buffer.as_mut();
        if used {
            buffer[idx] |= mask;
        } else {
            buffer[idx] &= !mask;
        }
    }

    /// Store `bytes` in the first free slot and mark it used
    pub fn insert(&mut self, bytes: &[u8]) -> RecordResult<Option<SlotId>> {
        if bytes.len() != self.layout.slot_size {
            return Err(RecordError::Deserialization(format!(
                "slot is {} bytes, got {}",
                self.layout.slot_size,
                bytes.len()
            )));
        }
        let Some(slot) = self.find_free_slot() else {
            return Ok(None);
        };
        let range = self.layout.slot_range(slot);
        self.buffer.as_mut()[range].copy_from_slice(bytes);
        self.set_slot_used(slot, true);
        Ok(Some(slot))
    }

    /// Mark a slot free; its bytes are left in place
    pub fn clear_slot(&mut self, slot: SlotId) {
        self.set_slot_used(slot, false);
    }
}

/// A heap page: slotted page with no header, holding whole tuples
pub struct HeapPage<B> {
    page_id: PageId,
    desc: Arc<TupleDesc>,
    page: SlottedPage<B>,
}

impl HeapPage<()> {
    /// Heap layout for tuples described by `desc`
    pub fn layout(desc: &TupleDesc) -> RecordResult<SlotLayout> {
        SlotLayout::new(0, desc.size())
    }

    /// Bytes of a brand-new heap page: every slot free
    pub fn empty_page_data() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }
}

impl<B: AsRef<[u8]>> HeapPage<B> {
    pub fn new(page_id: PageId, desc: Arc<TupleDesc>, buffer: B) -> RecordResult<Self> {
        let layout = HeapPage::layout(&desc)?;
        Ok(Self {
            page_id,
            desc,
            page: SlottedPage::new(buffer, layout)?,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.page.layout().slot_count()
    }

    pub fn is_slot_used(&self, slot: SlotId) -> bool {
        self.page.is_slot_used(slot)
    }

    pub fn has_free_slot(&self) -> bool {
        self.page.find_free_slot().is_some()
    }

    /// Decode the tuple in `slot`, stamped with its record id
    pub fn tuple(&self, slot: SlotId) -> RecordResult<Tuple> {
        if !self.page.is_slot_used(slot) {
            return Err(RecordError::TupleNotFound {
                page: self.page_id,
                slot,
            });
        }
        let mut tuple = Tuple::deserialize(self.desc.clone(), self.page.slot_bytes(slot))?;
        tuple.set_record_id(Some(RecordId::new(self.page_id, slot)));
        Ok(tuple)
    }

    /// Every occupied tuple in slot order
    pub fn tuples(&self) -> RecordResult<Vec<Tuple>> {
        self.page.used_slots().map(|slot| self.tuple(slot)).collect()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HeapPage<B> {
    /// Insert a tuple into the first free slot, returning its record id
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> RecordResult<RecordId> {
        let bytes = tuple.serialize()?;
        match self.page.insert(&bytes)? {
            Some(slot) => Ok(RecordId::new(self.page_id, slot)),
            None => Err(RecordError::PageFull(self.page_id)),
        }
    }

    pub fn delete_tuple(&mut self, slot: SlotId) -> RecordResult<()> {
        if !self.page.is_slot_used(slot) {
            return Err(RecordError::TupleNotFound {
                page: self.page_id,
                slot,
            });
        }
        self.page.clear_slot(slot);
        Ok(())
    }
}
