use bytemuck::{Pod, Zeroable};
use enumflags2::{bitflags, BitFlags};
use solana_program::pubkey::Pubkey;

use crate::error::{DexError, DexResult};
use crate::state::queue::{Queue, QueueRecord};
use crate::state::Side;

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Bits of an event's flags byte.
pub enum EventFlag {
    /// A trade
    Fill = 0x1,
    /// An order left the book
    Out = 0x2,
    /// The order was a bid
    Bid = 0x4,
    /// The order was resting
    Maker = 0x8,
    /// Locked funds can be released
    ReleaseFunds = 0x10,
}

/// One settled outcome of the matching engine, waiting to be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Part or all of an order traded
    Fill {
        /// Side of the filled order
        side: Side,
        /// The filled order was resting on the book
        maker: bool,
        /// Native units the owner gave up
        native_qty_paid: u64,
        /// Native units the owner gained
        native_qty_received: u64,
        /// Positive for fees, negative for maker rebates, two's complement
        native_fee_or_rebate: u64,
        /// Id of the filled order
        order_id: u128,
        /// Open orders account of the order's owner
        owner: Pubkey,
        /// Slot of the order in `owner`
        owner_slot: u8,
        /// Fee tier the order was placed with
        fee_tier: u8,
        /// Client supplied id, zero when none
        client_order_id: u64,
    },
    /// An order left the book, either cancelled or fully filled
    Out {
        /// Side of the order
        side: Side,
        /// `native_qty_unlocked` becomes free
        release_funds: bool,
        /// Native units no longer locked by the order
        native_qty_unlocked: u64,
        /// Native units still locked
        native_qty_still_locked: u64,
        /// Id of the order
        order_id: u128,
        /// Open orders account of the order's owner
        owner: Pubkey,
        /// Slot of the order in `owner`
        owner_slot: u8,
        /// Fee tier the order was placed with
        fee_tier: u8,
        /// Client supplied id, zero when none
        client_order_id: u64,
    },
}

impl Event {
    /// Side of the order the event is about
    pub fn side(&self) -> Side {
        match self {
            Event::Fill { side, .. } | Event::Out { side, .. } => *side,
        }
    }

    /// Id of the order the event is about
    pub fn order_id(&self) -> u128 {
        match self {
            Event::Fill { order_id, .. } | Event::Out { order_id, .. } => *order_id,
        }
    }

    /// The open orders account the event settles into
    pub fn owner(&self) -> &Pubkey {
        match self {
            Event::Fill { owner, .. } | Event::Out { owner, .. } => owner,
        }
    }

    /// Client supplied id, zero when none
    pub fn client_order_id(&self) -> u64 {
        match self {
            Event::Fill {
                client_order_id, ..
            }
            | Event::Out {
                client_order_id, ..
            } => *client_order_id,
        }
    }

    /// Whether this is a [`Event::Fill`]
    pub fn is_fill(&self) -> bool {
        matches!(self, Event::Fill { .. })
    }

    /// The flags byte this event is stored with
    pub fn flags(&self) -> BitFlags<EventFlag> {
        let (mut flags, side) = match self {
            Event::Fill { side, maker, .. } => {
                let mut f = BitFlags::from(EventFlag::Fill);
                if *maker {
                    f |= EventFlag::Maker;
                }
                (f, side)
            }
            Event::Out {
                side,
                release_funds,
                ..
            } => {
                let mut f = BitFlags::from(EventFlag::Out);
                if *release_funds {
                    f |= EventFlag::ReleaseFunds;
                }
                (f, side)
            }
        };
        if *side == Side::Bid {
            flags |= EventFlag::Bid;
        }
        flags
    }
}

/// An event slot as stored in the queue
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct EventRaw {
    flags: u8,
    owner_slot: u8,
    fee_tier: u8,
    padding: [u8; 5],
    native_qty_released: u64,
    native_qty_paid: u64,
    native_fee_or_rebate: u64,
    order_id: u128,
    owner: [u8; 32],
    client_order_id: u64,
}

fn unknown_flags(raw: u8) -> DexError {
    DexError::UnknownVariant {
        kind: "event flags",
        tag: raw as u64,
    }
}

impl QueueRecord for Event {
    type Raw = EventRaw;
    const KIND: &'static str = "event";

    fn from_raw(raw: &EventRaw) -> DexResult<Self> {
        let raw_flags = raw.flags;
        let flags = BitFlags::<EventFlag>::from_bits(raw_flags).map_err(|_| unknown_flags(raw_flags))?;
        let side = if flags.contains(EventFlag::Bid) {
            Side::Bid
        } else {
            Side::Ask
        };
        let owner = Pubkey::new_from_array(raw.owner);
        let fill_allowed = EventFlag::Fill | EventFlag::Bid | EventFlag::Maker;
        let out_allowed = EventFlag::Out | EventFlag::Bid | EventFlag::ReleaseFunds;
        if flags.contains(EventFlag::Fill) && fill_allowed.contains(flags) {
            Ok(Event::Fill {
                side,
                maker: flags.contains(EventFlag::Maker),
                native_qty_paid: raw.native_qty_paid,
                native_qty_received: raw.native_qty_released,
                native_fee_or_rebate: raw.native_fee_or_rebate,
                order_id: raw.order_id,
                owner,
                owner_slot: raw.owner_slot,
                fee_tier: raw.fee_tier,
                client_order_id: raw.client_order_id,
            })
        } else if flags.contains(EventFlag::Out) && out_allowed.contains(flags) {
            Ok(Event::Out {
                side,
                release_funds: flags.contains(EventFlag::ReleaseFunds),
                native_qty_unlocked: raw.native_qty_released,
                native_qty_still_locked: raw.native_qty_paid,
                order_id: raw.order_id,
                owner,
                owner_slot: raw.owner_slot,
                fee_tier: raw.fee_tier,
                client_order_id: raw.client_order_id,
            })
        } else {
            Err(unknown_flags(raw_flags))
        }
    }

    fn to_raw(&self) -> EventRaw {
        let (owner_slot, fee_tier, released, paid, fee) = match *self {
            Event::Fill {
                owner_slot,
                fee_tier,
                native_qty_received,
                native_qty_paid,
                native_fee_or_rebate,
                ..
            } => (
                owner_slot,
                fee_tier,
                native_qty_received,
                native_qty_paid,
                native_fee_or_rebate,
            ),
            Event::Out {
                owner_slot,
                fee_tier,
                native_qty_unlocked,
                native_qty_still_locked,
                ..
            } => (
                owner_slot,
                fee_tier,
                native_qty_unlocked,
                native_qty_still_locked,
                0,
            ),
        };
        EventRaw {
            flags: self.flags().bits(),
            owner_slot,
            fee_tier,
            padding: [0; 5],
            native_qty_released: released,
            native_qty_paid: paid,
            native_fee_or_rebate: fee,
            order_id: self.order_id(),
            owner: self.owner().to_bytes(),
            client_order_id: self.client_order_id(),
        }
    }
}

/// The decoded event queue of a market
pub type EventQueue = Queue<Event>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{read_pod, AccountFlag};

    fn encode(event: &Event) -> Vec<u8> {
        bytemuck::bytes_of(&event.to_raw()).to_vec()
    }

    fn decode(bytes: &[u8]) -> DexResult<Event> {
        Event::from_raw(&read_pod(bytes, 0)?)
    }

    fn out(side: Side, release_funds: bool) -> Event {
        Event::Out {
            side,
            release_funds,
            native_qty_unlocked: 250,
            native_qty_still_locked: 1_000,
            order_id: (20u128 << 64) | !9u64 as u128,
            owner: Pubkey::new_from_array([3; 32]),
            owner_slot: 127,
            fee_tier: 6,
            client_order_id: u64::MAX,
        }
    }

    fn fill(side: Side, maker: bool) -> Event {
        Event::Fill {
            side,
            maker,
            native_qty_paid: 1_500,
            native_qty_received: 3,
            native_fee_or_rebate: (-2i64) as u64,
            order_id: (15u128 << 64) | 7,
            owner: Pubkey::new_from_array([9; 32]),
            owner_slot: 4,
            fee_tier: 1,
            client_order_id: 42,
        }
    }

    #[test]
    fn fill_layout() {
        let bytes = encode(&fill(Side::Bid, true));
        assert_eq!(bytes.len(), Event::LEN);
        assert_eq!(bytes[0], 0x1 | 0x4 | 0x8);
        assert_eq!(&bytes[1..8], &[4, 1, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[8..16], &3u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &1_500u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &(-2i64).to_le_bytes());
        assert_eq!(&bytes[48..80], &[9; 32]);
        assert_eq!(&bytes[80..88], &42u64.to_le_bytes());
        assert_eq!(
            decode(&bytes).unwrap(),
            fill(Side::Bid, true)
        );
    }

    #[test]
    fn out_event_fields() {
        let mut bytes = vec![0u8; Event::LEN];
        bytes[0] = 0x2 | 0x10;
        bytes[8] = 5;
        bytes[16] = 6;
        let event = decode(&bytes).unwrap();
        match event {
            Event::Out {
                side,
                release_funds,
                native_qty_unlocked,
                native_qty_still_locked,
                ..
            } => {
                assert_eq!(side, Side::Ask);
                assert!(release_funds);
                assert_eq!(native_qty_unlocked, 5);
                assert_eq!(native_qty_still_locked, 6);
            }
            _ => panic!("expected an out event"),
        }
        assert!(!event.is_fill());
    }

    #[test]
    fn every_variant_round_trips() {
        let events = [
            fill(Side::Bid, true),
            fill(Side::Ask, false),
            out(Side::Bid, false),
            out(Side::Ask, true),
        ];
        for event in events.iter() {
            let bytes = encode(event);
            assert_eq!(bytes.len(), Event::LEN);
            assert_eq!(decode(&bytes).as_ref(), Ok(event));
            assert_eq!(bytes[0], event.flags().bits());
        }
        assert_eq!(encode(&out(Side::Bid, false))[0], 0x2 | 0x4);
    }

    #[test]
    fn invalid_flag_combinations() {
        for raw in [0u8, 0x1 | 0x2, 0x1 | 0x10, 0x2 | 0x8, 0x20, 0x4] {
            let mut bytes = vec![0u8; Event::LEN];
            bytes[0] = raw;
            assert_eq!(
                decode(&bytes),
                Err(DexError::UnknownVariant {
                    kind: "event flags",
                    tag: raw as u64
                }),
                "flags {:#x}",
                raw
            );
        }
    }

    #[test]
    fn queue_of_events() {
        let queue = EventQueue::from_records(
            4,
            3,
            10,
            AccountFlag::Initialized | AccountFlag::EventQueue,
            vec![fill(Side::Ask, false), fill(Side::Bid, true)],
        )
        .unwrap();
        let data = crate::state::pad_account(&queue.to_bytes());
        let decoded = EventQueue::from_account(&data, AccountFlag::EventQueue).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.peek_at(1).unwrap().side(), Side::Bid);
        assert_eq!(decoded.physical_index(1), 0);
    }
}
