use std::sync::Arc;

use crate::file::{PAGE_SIZE, PageId};
use crate::record::{RecordError, RecordId, RecordResult, SlotId, SlotLayout, SlottedPage, Tuple, TupleDesc};

/// Bytes reserved at the start of an index page for the overflow link
pub const OVERFLOW_HEADER_LEN: usize = 4;

/// Link value written into pages with no overflow successor
pub const NO_OVERFLOW: i32 = -1;

/// Bucket or overflow page of a hash index.
///
/// Layout: `[overflow link: i32 LE][presence bitmap][entry slots]`. A link
/// below the index's bucket count means the chain ends here.
pub struct IndexPage<B> {
    page_id: PageId,
    desc: Arc<TupleDesc>,
    page: SlottedPage<B>,
}

impl IndexPage<()> {
    pub fn layout(entry_desc: &TupleDesc) -> RecordResult<SlotLayout> {
        SlotLayout::new(OVERFLOW_HEADER_LEN, entry_desc.size())
    }

    /// Bytes of a brand-new index page: no entries, no overflow
    pub fn empty_page_data() -> Vec<u8> {
        let mut data = vec![0u8; PAGE_SIZE];
        data[..OVERFLOW_HEADER_LEN].copy_from_slice(&NO_OVERFLOW.to_le_bytes());
        data
    }
}

impl<B: AsRef<[u8]>> IndexPage<B> {
    pub fn new(page_id: PageId, desc: Arc<TupleDesc>, buffer: B) -> RecordResult<Self> {
        let layout = IndexPage::layout(&desc)?;
        Ok(Self {
            page_id,
            desc,
            page: SlottedPage::new(buffer, layout)?,
        })
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Raw overflow link as stored
    pub fn overflow_link(&self) -> i32 {
        let header = self.page.header();
        i32::from_le_bytes([header[0], header[1], header[2], header[3]])
    }

    /// Page number of the next page in the chain, if any
    pub fn next_overflow(&self, bucket_count: usize) -> Option<usize> {
        let link = self.overflow_link();
        if link < 0 || (link as usize) < bucket_count {
            None
        } else {
            Some(link as usize)
        }
    }

    pub fn slot_count(&self) -> usize {
        self.page.layout().slot_count()
    }

    pub fn has_free_slot(&self) -> bool {
        self.page.find_free_slot().is_some()
    }

    pub fn entry_count(&self) -> usize {
        self.page.used_count()
    }

    /// Stored entries in slot order
    pub fn entries(&self) -> RecordResult<Vec<Tuple>> {
        self.page
            .used_slots()
            .map(|slot| {
                let mut entry = Tuple::deserialize(self.desc.clone(), self.page.slot_bytes(slot))?;
                entry.set_record_id(Some(RecordId::new(self.page_id, slot)));
                Ok(entry)
            })
            .collect()
    }

    /// Slot holding an entry byte-equal to `entry`
    pub fn find_entry(&self, entry: &Tuple) -> RecordResult<Option<SlotId>> {
        let bytes = entry.serialize()?;
        Ok(self
            .page
            .used_slots()
            .find(|&slot| self.page.slot_bytes(slot) == bytes.as_slice()))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> IndexPage<B> {
    pub fn set_overflow_link(&mut self, link: i32) {
        self.page.header_mut().copy_from_slice(&link.to_le_bytes());
    }

    pub fn insert_entry(&mut self, entry: &Tuple) -> RecordResult<SlotId> {
        let bytes = entry.serialize()?;
        self.page
            .insert(&bytes)?
            .ok_or(RecordError::PageFull(self.page_id))
    }

    /// Remove the first entry equal to `entry`; returns whether one was found
    pub fn delete_entry(&mut self, entry: &Tuple) -> RecordResult<bool> {
        match self.find_entry(entry)? {
            Some(slot) => {
                self.page.clear_slot(slot);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileId;
    use crate::record::{Field, Type};

    const PAGE: PageId = PageId::bucket(FileId(2), 5);

    fn desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::index_entry(Type::Int))
    }

    fn entry(key: i32, page: i32, slot: i32) -> Tuple {
        Tuple::new(desc(), vec![Field::Int(key), Field::Int(page), Field::Int(slot)]).unwrap()
    }

    #[test]
    fn test_int_entry_capacity() {
        assert_eq!(IndexPage::layout(&desc()).unwrap().slot_count(), 337);
    }

    #[test]
    fn test_fresh_page_has_no_overflow() {
        let data = IndexPage::empty_page_data();
        let page = IndexPage::new(PAGE, desc(), &data[..]).unwrap();
        assert_eq!(page.overflow_link(), NO_OVERFLOW);
        assert_eq!(page.next_overflow(97), None);
        assert_eq!(page.entry_count(), 0);
    }

    #[test]
    fn test_zeroed_page_reads_as_no_overflow() {
        let data = vec![0u8; PAGE_SIZE];
        let page = IndexPage::new(PAGE, desc(), &data[..]).unwrap();
        assert_eq!(page.next_overflow(97), None);
    }

    #[test]
    fn test_overflow_link_round_trip() {
        let mut data = IndexPage::empty_page_data();
        let mut page = IndexPage::new(PAGE, desc(), &mut data[..]).unwrap();
        page.set_overflow_link(120);
        assert_eq!(page.next_overflow(97), Some(120));
        // Links into the bucket region are not overflow pages
        page.set_overflow_link(50);
        assert_eq!(page.next_overflow(97), None);
        assert_eq!(&data[..4], &50i32.to_le_bytes());
    }

    #[test]
    fn test_insert_find_delete() {
        let mut data = IndexPage::empty_page_data();
        let mut page = IndexPage::new(PAGE, desc(), &mut data[..]).unwrap();
        page.insert_entry(&entry(1, 0, 0)).unwrap();
        page.insert_entry(&entry(1, 0, 1)).unwrap();
        page.insert_entry(&entry(2, 3, 4)).unwrap();

        assert_eq!(page.find_entry(&entry(1, 0, 1)).unwrap(), Some(1));
        assert!(page.delete_entry(&entry(1, 0, 1)).unwrap());
        assert!(!page.delete_entry(&entry(1, 0, 1)).unwrap());

        let entries = page.entries().unwrap();
        assert_eq!(entries, vec![entry(1, 0, 0), entry(2, 3, 4)]);
        assert_eq!(entries[1].record_id(), Some(RecordId::new(PAGE, 2)));
        assert_eq!(page.overflow_link(), NO_OVERFLOW);
    }

    #[test]
    fn test_full_page() {
        let mut data = IndexPage::empty_page_data();
        let mut page = IndexPage::new(PAGE, desc(), &mut data[..]).unwrap();
        for i in 0..page.slot_count() {
            page.insert_entry(&entry(i as i32, 0, 0)).unwrap();
        }
        assert!(!page.has_free_slot());
        assert!(matches!(
            page.insert_entry(&entry(0, 0, 0)),
            Err(RecordError::PageFull(_))
        ));
    }
}
