use bytemuck::{Pod, Zeroable};
use enumflags2::BitFlags;
use tracing::debug;

use crate::error::{DexError, DexResult};
use crate::state::{parse_account_flags, read_pod, remove_slop, strip_account_padding, AccountFlag};

/// A fixed-size record stored in a queue's circular buffer.
pub trait QueueRecord: Sized {
    /// The record as laid out in its slot
    type Raw: Pod;
    /// Size of one slot, in bytes
    const LEN: usize = std::mem::size_of::<Self::Raw>();
    /// Short name used in logs and errors
    const KIND: &'static str;

    /// Decode one slot.
    fn from_raw(raw: &Self::Raw) -> DexResult<Self>;

    /// Encode into one slot.
    fn to_raw(&self) -> Self::Raw;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
/// Describes the current state of a queue
pub struct QueueHeader {
    /// Raw account flags word
    pub account_flags: u64,
    /// Physical slot of the oldest live record
    pub head: u64,
    /// Number of live records
    pub count: u64,
    /// Sequence number the next pushed record gets
    pub next_seq_num: u64,
}

impl QueueHeader {
    /// Serialized size of the header
    pub const LEN: usize = std::mem::size_of::<Self>();
}

/// A decoded circular queue.
///
/// Only the live records are kept, in logical (oldest first) order. Slots
/// outside the live window may hold stale or zeroed bytes and are never
/// interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue<R> {
    header: QueueHeader,
    capacity: usize,
    records: Vec<R>,
}

impl<R: QueueRecord> Queue<R> {
    /// Decode a queue buffer: a 32 byte header followed by whole record slots.
    pub fn parse(data: &[u8]) -> DexResult<Self> {
        if data.len() < QueueHeader::LEN || (data.len() - QueueHeader::LEN) % R::LEN != 0 {
            return Err(DexError::MalformedQueue {
                len: data.len(),
                reason: "not a header followed by whole records",
            });
        }
        let capacity = (data.len() - QueueHeader::LEN) / R::LEN;
        let header: QueueHeader = read_pod(data, 0)?;
        if header.count > capacity as u64 {
            return Err(DexError::MalformedQueue {
                len: data.len(),
                reason: "count exceeds capacity",
            });
        }
        if capacity > 0 && header.head >= capacity as u64 {
            return Err(DexError::MalformedQueue {
                len: data.len(),
                reason: "head outside the buffer",
            });
        }
        let slots = &data[QueueHeader::LEN..];
        let records = (0..header.count as usize)
            .map(|i| {
                let slot = (header.head as usize + i) % capacity;
                R::from_raw(&read_pod(slots, slot * R::LEN)?)
            })
            .collect::<DexResult<Vec<_>>>()?;
        debug!(
            kind = R::KIND,
            capacity,
            count = header.count,
            head = header.head,
            "Decoded queue"
        );
        Ok(Self {
            header,
            capacity,
            records,
        })
    }

    /// Decode the queue out of a full account, checking its flags.
    pub fn from_account(data: &[u8], expected: AccountFlag) -> DexResult<Self> {
        let body = strip_account_padding(data)?;
        parse_account_flags(read_pod(body, 0)?, AccountFlag::Initialized | expected)?;
        Self::parse(remove_slop(body, QueueHeader::LEN, R::LEN))
    }

    /// Encode the queue. Slots outside the live window are written as zeros.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut slots = vec![R::Raw::zeroed(); self.capacity];
        for (i, record) in self.records.iter().enumerate() {
            slots[self.physical_index(i)] = record.to_raw();
        }
        let mut data = Vec::with_capacity(QueueHeader::LEN + self.capacity * R::LEN);
        data.extend_from_slice(bytemuck::bytes_of(&self.header));
        data.extend_from_slice(bytemuck::cast_slice(&slots));
        data
    }
}

impl<R> Queue<R> {
    /// Build a queue holding `records`, oldest first, starting at physical slot `head`.
    pub fn from_records(
        capacity: usize,
        head: u64,
        next_seq_num: u64,
        flags: BitFlags<AccountFlag>,
        records: Vec<R>,
    ) -> DexResult<Self> {
        if records.len() > capacity || (capacity > 0 && head >= capacity as u64) {
            return Err(DexError::MalformedQueue {
                len: capacity,
                reason: "records do not fit the queue",
            });
        }
        Ok(Self {
            header: QueueHeader {
                account_flags: flags.bits(),
                head,
                count: records.len() as u64,
                next_seq_num,
            },
            capacity,
            records,
        })
    }

    /// The decoded header
    pub fn header(&self) -> &QueueHeader {
        &self.header
    }

    /// Number of record slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// The queue holds no live records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Retrieves the record at logical position `index`, oldest first.
    pub fn peek_at(&self, index: usize) -> Option<&R> {
        self.records.get(index)
    }

    /// Physical slot holding the record at logical position `index`.
    pub fn physical_index(&self, index: usize) -> usize {
        if self.capacity == 0 {
            return 0;
        }
        (self.header.head as usize + index) % self.capacity
    }

    /// Returns an iterator over all the queue's records
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    /// Take the live records, oldest first
    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<'a, R> IntoIterator for &'a Queue<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Tick(u32);

    impl QueueRecord for Tick {
        type Raw = [u32; 2];
        const KIND: &'static str = "tick";

        fn from_raw(raw: &[u32; 2]) -> DexResult<Self> {
            if raw[0] == 0 {
                return Err(DexError::UnknownVariant {
                    kind: Self::KIND,
                    tag: 0,
                });
            }
            Ok(Tick(raw[0]))
        }

        fn to_raw(&self) -> [u32; 2] {
            [self.0, 0]
        }
    }

    fn raw_queue(head: u64, count: u64, slots: &[u32]) -> Vec<u8> {
        let header = QueueHeader {
            account_flags: AccountFlag::Initialized as u64 | AccountFlag::EventQueue as u64,
            head,
            count,
            next_seq_num: 99,
        };
        let mut data = bytemuck::bytes_of(&header).to_vec();
        for value in slots {
            data.extend_from_slice(bytemuck::bytes_of(&[*value, 0]));
        }
        data
    }

    #[test]
    fn wraps_around_the_buffer() {
        let data = raw_queue(3, 3, &[6, 0, 0, 4, 5]);
        let queue = Queue::<Tick>::parse(&data).unwrap();
        assert_eq!(queue.capacity(), 5);
        assert_eq!(queue.len(), 3);
        assert_eq!(
            queue.iter().copied().collect::<Vec<_>>(),
            vec![Tick(4), Tick(5), Tick(6)]
        );
        assert_eq!(queue.physical_index(2), 0);
        assert_eq!(queue.peek_at(1), Some(&Tick(5)));
        assert_eq!(queue.peek_at(3), None);
        // iteration restarts from the oldest record
        assert_eq!(queue.iter().count(), 3);
        assert_eq!(queue.header().next_seq_num, 99);
    }

    #[test]
    fn stale_slots_are_not_decoded() {
        let data = raw_queue(0, 0, &[0, 0, 0]);
        let queue = Queue::<Tick>::parse(&data).unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.iter().next(), None);
    }

    #[test]
    fn round_trips_live_window() {
        let data = raw_queue(1, 2, &[0, 7, 8, 0]);
        let queue = Queue::<Tick>::parse(&data).unwrap();
        assert_eq!(queue.to_bytes(), data);
    }

    #[test]
    fn malformed_buffers() {
        let data = raw_queue(0, 1, &[1, 2]);
        assert!(matches!(
            Queue::<Tick>::parse(&data[..data.len() - 1]),
            Err(DexError::MalformedQueue { .. })
        ));
        assert!(matches!(
            Queue::<Tick>::parse(&data[..20]),
            Err(DexError::MalformedQueue { .. })
        ));
        assert!(matches!(
            Queue::<Tick>::parse(&raw_queue(0, 3, &[1, 2])),
            Err(DexError::MalformedQueue { .. })
        ));
        assert!(matches!(
            Queue::<Tick>::parse(&raw_queue(2, 1, &[1, 2])),
            Err(DexError::MalformedQueue { .. })
        ));
    }

    #[test]
    fn account_envelope_and_slop() {
        let mut body = raw_queue(0, 1, &[1, 2]);
        body.extend_from_slice(&[0xee; 3]);
        let data = crate::state::pad_account(&body);
        let queue = Queue::<Tick>::from_account(&data, AccountFlag::EventQueue).unwrap();
        assert_eq!(queue.capacity(), 2);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![Tick(1)]);

        assert!(matches!(
            Queue::<Tick>::from_account(&data, AccountFlag::RequestQueue),
            Err(DexError::WrongAccountFlags { .. })
        ));
        // strict parsing keeps the slop and rejects it
        assert!(Queue::<Tick>::parse(&body).is_err());
    }

    #[test]
    fn built_queues_place_records_from_head() {
        let queue = Queue::from_records(
            3,
            2,
            5,
            AccountFlag::Initialized | AccountFlag::EventQueue,
            vec![Tick(1), Tick(2)],
        )
        .unwrap();
        let reparsed = Queue::<Tick>::parse(&queue.to_bytes()).unwrap();
        assert_eq!(reparsed, queue);
        assert_eq!(reparsed.physical_index(1), 0);
        assert!(Queue::from_records(
            1,
            0,
            0,
            BitFlags::empty(),
            vec![Tick(1), Tick(2)]
        )
        .is_err());
    }
}
