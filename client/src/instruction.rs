use borsh::{BorshDeserialize, BorshSerialize};
use bytemuck::{Pod, Zeroable};
use num_derive::FromPrimitive;
use solana_program::{instruction::Instruction, pubkey::Pubkey};

use crate::error::{DexError, DexResult};
use crate::state::{parse_tag, read_pod};

pub mod cancel_order;
pub mod consume_events;
pub mod initialize_market;
pub mod match_orders;
pub mod new_order;
pub mod settle_funds;

/// Every instruction starts with this version byte
pub const INSTRUCTION_VERSION: u8 = 0;

/// Leads every instruction's data, followed by the borsh encoded payload
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
struct InstructionHeader {
    version: u8,
    tag: u32,
}

const HEADER_LEN: usize = std::mem::size_of::<InstructionHeader>();

#[derive(FromPrimitive, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
enum InstructionTag {
    InitializeMarket = 0,
    NewOrder = 1,
    MatchOrders = 2,
    ConsumeEvents = 3,
    CancelOrder = 4,
    SettleFunds = 5,
    CancelOrderByClientId = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Describes all possible instructions and their required accounts
pub enum MarketInstruction {
    /// Initialize a new market
    ///
    /// Required accounts
    ///
    /// | index | writable | signer | description               |
    /// |-------|----------|--------|---------------------------|
    /// | 0     | ✅       | ❌     | The market account        |
    /// | 1     | ✅       | ❌     | The request queue account |
    /// | 2     | ✅       | ❌     | The event queue account   |
    /// | 3     | ✅       | ❌     | The bids account          |
    /// | 4     | ✅       | ❌     | The asks account          |
    /// | 5     | ✅       | ❌     | The base vault            |
    /// | 6     | ✅       | ❌     | The quote vault           |
    /// | 7     | ❌       | ❌     | The base mint             |
    /// | 8     | ❌       | ❌     | The quote mint            |
    /// | 9     | ❌       | ❌     | The rent sysvar           |
    InitializeMarket(initialize_market::Params),
    /// Push a new order onto the request queue.
    ///
    /// Required accounts
    ///
    /// | index | writable | signer | description                    |
    /// |-------|----------|--------|--------------------------------|
    /// | 0     | ✅       | ❌     | The market account             |
    /// | 1     | ✅       | ❌     | The owner's open orders        |
    /// | 2     | ✅       | ❌     | The request queue account      |
    /// | 3     | ✅       | ❌     | The payer token account        |
    /// | 4     | ❌       | ✅     | The open orders owner          |
    /// | 5     | ✅       | ❌     | The base vault                 |
    /// | 6     | ✅       | ❌     | The quote vault                |
    /// | 7     | ❌       | ❌     | The token program              |
    /// | 8     | ❌       | ❌     | The rent sysvar                |
    NewOrder(new_order::Params),
    /// Match up to `limit` requests.
    ///
    /// Required accounts
    ///
    /// | index | writable | signer | description               |
    /// |-------|----------|--------|---------------------------|
    /// | 0     | ✅       | ❌     | The market account        |
    /// | 1     | ✅       | ❌     | The request queue account |
    /// | 2     | ✅       | ❌     | The event queue account   |
    /// | 3     | ✅       | ❌     | The bids account          |
    /// | 4     | ✅       | ❌     | The asks account          |
    /// | 5     | ✅       | ❌     | The base vault            |
    /// | 6     | ✅       | ❌     | The quote vault           |
    MatchOrders(u16),
    /// Pop up to `limit` events off the event queue.
    ///
    /// Required accounts
    ///
    /// | index | writable | signer | description                     |
    /// |-------|----------|--------|---------------------------------|
    /// | 0..n  | ✅       | ❌     | The open orders accounts to credit |
    /// | n     | ✅       | ❌     | The market account              |
    /// | n + 1 | ✅       | ❌     | The event queue account         |
    /// | n + 2 | ✅       | ❌     | The base vault                  |
    /// | n + 3 | ✅       | ❌     | The quote vault                 |
    ConsumeEvents(u16),
    /// Request the cancellation of a resting order.
    ///
    /// Required accounts
    ///
    /// | index | writable | signer | description               |
    /// |-------|----------|--------|---------------------------|
    /// | 0     | ❌       | ❌     | The market account        |
    /// | 1     | ✅       | ❌     | The owner's open orders   |
    /// | 2     | ✅       | ❌     | The request queue account |
    /// | 3     | ❌       | ✅     | The open orders owner     |
    CancelOrder(cancel_order::Params),
    /// Withdraw free balances to the owner's wallets.
    ///
    /// Required accounts
    ///
    /// | index | writable | signer | description             |
    /// |-------|----------|--------|-------------------------|
    /// | 0     | ✅       | ❌     | The market account      |
    /// | 1     | ✅       | ❌     | The owner's open orders |
    /// | 2     | ❌       | ✅     | The open orders owner   |
    /// | 3     | ✅       | ❌     | The base vault          |
    /// | 4     | ✅       | ❌     | The quote vault         |
    /// | 5     | ✅       | ❌     | The base wallet         |
    /// | 6     | ✅       | ❌     | The quote wallet        |
    /// | 7     | ❌       | ❌     | The vault signer        |
    /// | 8     | ❌       | ❌     | The token program       |
    SettleFunds,
    /// Same as [`MarketInstruction::CancelOrder`], identifying the order by its client id.
    CancelOrderByClientId(u64),
}

fn payload<P: BorshDeserialize>(data: &[u8], len: usize, tag: u32) -> DexResult<P> {
    if data.len() < len {
        return Err(DexError::TruncatedBuffer {
            offset: HEADER_LEN,
            needed: len,
            available: data.len(),
        });
    }
    if data.len() > len {
        return Err(DexError::MalformedInstruction("trailing bytes after payload"));
    }
    P::try_from_slice(data).map_err(|_| DexError::UnknownVariant {
        kind: "instruction payload",
        tag: tag as u64,
    })
}

impl MarketInstruction {
    fn tag(&self) -> InstructionTag {
        match self {
            MarketInstruction::InitializeMarket(_) => InstructionTag::InitializeMarket,
            MarketInstruction::NewOrder(_) => InstructionTag::NewOrder,
            MarketInstruction::MatchOrders(_) => InstructionTag::MatchOrders,
            MarketInstruction::ConsumeEvents(_) => InstructionTag::ConsumeEvents,
            MarketInstruction::CancelOrder(_) => InstructionTag::CancelOrder,
            MarketInstruction::SettleFunds => InstructionTag::SettleFunds,
            MarketInstruction::CancelOrderByClientId(_) => InstructionTag::CancelOrderByClientId,
        }
    }

    /// Encode as instruction data: version byte, `u32` tag, payload.
    pub fn pack(&self) -> DexResult<Vec<u8>> {
        let header = InstructionHeader {
            version: INSTRUCTION_VERSION,
            tag: self.tag() as u32,
        };
        let mut data = bytemuck::bytes_of(&header).to_vec();
        match self {
            MarketInstruction::InitializeMarket(p) => p.serialize(&mut data),
            MarketInstruction::NewOrder(p) => p.serialize(&mut data),
            MarketInstruction::MatchOrders(limit) | MarketInstruction::ConsumeEvents(limit) => {
                limit.serialize(&mut data)
            }
            MarketInstruction::CancelOrder(p) => p.serialize(&mut data),
            MarketInstruction::SettleFunds => Ok(()),
            MarketInstruction::CancelOrderByClientId(id) => id.serialize(&mut data),
        }
        .map_err(|e| DexError::Serialization(e.to_string()))?;
        Ok(data)
    }

    /// Decode instruction data produced by [`MarketInstruction::pack`].
    pub fn unpack(data: &[u8]) -> DexResult<Self> {
        let header: InstructionHeader = read_pod(data, 0)?;
        let version = header.version;
        if version != INSTRUCTION_VERSION {
            return Err(DexError::UnknownVariant {
                kind: "instruction version",
                tag: version as u64,
            });
        }
        let tag = parse_tag::<InstructionTag>(header.tag, "instruction")?;
        let rest = &data[HEADER_LEN..];
        let raw_tag = tag as u32;
        Ok(match tag {
            InstructionTag::InitializeMarket => MarketInstruction::InitializeMarket(payload(
                rest,
                initialize_market::Params::LEN,
                raw_tag,
            )?),
            InstructionTag::NewOrder => {
                MarketInstruction::NewOrder(payload(rest, new_order::Params::LEN, raw_tag)?)
            }
            InstructionTag::MatchOrders => MarketInstruction::MatchOrders(payload(rest, 2, raw_tag)?),
            InstructionTag::ConsumeEvents => {
                MarketInstruction::ConsumeEvents(payload(rest, 2, raw_tag)?)
            }
            InstructionTag::CancelOrder => {
                MarketInstruction::CancelOrder(payload(rest, cancel_order::Params::LEN, raw_tag)?)
            }
            InstructionTag::SettleFunds => {
                if !rest.is_empty() {
                    return Err(DexError::MalformedInstruction("trailing bytes after payload"));
                }
                MarketInstruction::SettleFunds
            }
            InstructionTag::CancelOrderByClientId => {
                MarketInstruction::CancelOrderByClientId(payload(rest, 8, raw_tag)?)
            }
        })
    }
}

/**
Initialize a new market.

The request queue, event queue, bids and asks accounts should be freshly allocated, zeroed out and owned by the program.
*/
pub fn initialize_market(
    program_id: Pubkey,
    accounts: initialize_market::Accounts,
    params: initialize_market::Params,
) -> DexResult<Instruction> {
    Ok(Instruction {
        program_id,
        accounts: accounts.metas(),
        data: MarketInstruction::InitializeMarket(params).pack()?,
    })
}

/**
Push a new order onto the request queue.

The order is only matched against the book once a match_orders instruction processes the request queue.
*/
pub fn new_order(
    program_id: Pubkey,
    accounts: new_order::Accounts,
    params: new_order::Params,
) -> DexResult<Instruction> {
    Ok(Instruction {
        program_id,
        accounts: accounts.metas(),
        data: MarketInstruction::NewOrder(params).pack()?,
    })
}

/// Match up to `limit` requests from the request queue.
pub fn match_orders(
    program_id: Pubkey,
    accounts: match_orders::Accounts,
    limit: u16,
) -> DexResult<Instruction> {
    Ok(Instruction {
        program_id,
        accounts: accounts.metas(),
        data: MarketInstruction::MatchOrders(limit).pack()?,
    })
}

/// Pop up to `limit` events off the event queue.
pub fn consume_events(
    program_id: Pubkey,
    accounts: consume_events::Accounts,
    limit: u16,
) -> DexResult<Instruction> {
    Ok(Instruction {
        program_id,
        accounts: accounts.metas(),
        data: MarketInstruction::ConsumeEvents(limit).pack()?,
    })
}

/// Cancel an existing order in the orderbook.
pub fn cancel_order(
    program_id: Pubkey,
    accounts: cancel_order::Accounts,
    params: cancel_order::Params,
) -> DexResult<Instruction> {
    Ok(Instruction {
        program_id,
        accounts: accounts.metas(),
        data: MarketInstruction::CancelOrder(params).pack()?,
    })
}

/// Cancel an existing order identified by the client id it was placed with.
pub fn cancel_order_by_client_id(
    program_id: Pubkey,
    accounts: cancel_order::Accounts,
    client_id: u64,
) -> DexResult<Instruction> {
    Ok(Instruction {
        program_id,
        accounts: accounts.metas(),
        data: MarketInstruction::CancelOrderByClientId(client_id).pack()?,
    })
}

/// Withdraw the free balances of an open orders account.
pub fn settle_funds(
    program_id: Pubkey,
    accounts: settle_funds::Accounts,
) -> DexResult<Instruction> {
    Ok(Instruction {
        program_id,
        accounts: accounts.metas(),
        data: MarketInstruction::SettleFunds.pack()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{OrderType, Side};

    #[test]
    fn new_order_bytes() {
        let ix = MarketInstruction::NewOrder(new_order::Params {
            side: Side::Ask,
            limit_price: 150,
            max_quantity: 30,
            order_type: OrderType::PostOnly,
            client_id: 7,
        });
        let mut expected = vec![0, 1, 0, 0, 0, 1, 0, 0, 0];
        expected.extend_from_slice(&[150, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(&[30, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(&[2, 0, 0, 0]);
        expected.extend_from_slice(&[7, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(ix.pack().unwrap(), expected);
        assert_eq!(MarketInstruction::unpack(&expected).unwrap(), ix);
    }

    #[test]
    fn small_instruction_bytes() {
        assert_eq!(
            MarketInstruction::MatchOrders(2).pack().unwrap(),
            vec![0, 2, 0, 0, 0, 2, 0]
        );
        assert_eq!(
            MarketInstruction::ConsumeEvents(0x0102).pack().unwrap(),
            vec![0, 3, 0, 0, 0, 2, 1]
        );
        assert_eq!(MarketInstruction::SettleFunds.pack().unwrap(), vec![0, 5, 0, 0, 0]);
        assert_eq!(
            MarketInstruction::CancelOrderByClientId(9).pack().unwrap(),
            vec![0, 6, 0, 0, 0, 9, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn cancel_order_bytes() {
        let params = cancel_order::Params {
            side: Side::Bid,
            order_id: 1u128 << 64,
            open_orders: [3; 32],
            open_orders_slot: 5,
        };
        let data = MarketInstruction::CancelOrder(params).pack().unwrap();
        assert_eq!(data.len(), 5 + cancel_order::Params::LEN);
        assert_eq!(&data[1..5], &[4, 0, 0, 0]);
        assert_eq!(&data[5..9], &[0, 0, 0, 0]);
        assert_eq!(&data[9..25], &(1u128 << 64).to_le_bytes());
        assert_eq!(&data[25..57], &[3; 32]);
        assert_eq!(data[57], 5);
        assert_eq!(
            MarketInstruction::unpack(&data).unwrap(),
            MarketInstruction::CancelOrder(params)
        );
    }

    #[test]
    fn initialize_market_bytes() {
        let params = initialize_market::Params {
            base_lot_size: 100,
            quote_lot_size: 10,
            fee_rate_bps: 22,
            vault_signer_nonce: 1,
            quote_dust_threshold: 5,
        };
        let data = MarketInstruction::InitializeMarket(params).pack().unwrap();
        assert_eq!(data.len(), 5 + initialize_market::Params::LEN);
        assert_eq!(&data[21..23], &[22, 0]);
        assert_eq!(
            MarketInstruction::unpack(&data).unwrap(),
            MarketInstruction::InitializeMarket(params)
        );
    }

    #[test]
    fn every_variant_round_trips() {
        let instructions = [
            MarketInstruction::InitializeMarket(initialize_market::Params {
                base_lot_size: 1,
                quote_lot_size: u64::MAX,
                fee_rate_bps: 0,
                vault_signer_nonce: 254,
                quote_dust_threshold: 3,
            }),
            MarketInstruction::NewOrder(new_order::Params {
                side: Side::Bid,
                limit_price: 99,
                max_quantity: 1,
                order_type: OrderType::ImmediateOrCancel,
                client_id: 0,
            }),
            MarketInstruction::MatchOrders(u16::MAX),
            MarketInstruction::ConsumeEvents(0),
            MarketInstruction::CancelOrder(cancel_order::Params {
                side: Side::Ask,
                order_id: u128::MAX,
                open_orders: [8; 32],
                open_orders_slot: 127,
            }),
            MarketInstruction::SettleFunds,
            MarketInstruction::CancelOrderByClientId(u64::MAX),
        ];
        for (tag, ix) in instructions.iter().enumerate() {
            let data = ix.pack().unwrap();
            assert_eq!(data[0], INSTRUCTION_VERSION);
            assert_eq!(&data[1..5], &(tag as u32).to_le_bytes());
            assert_eq!(MarketInstruction::unpack(&data).as_ref(), Ok(ix), "{:?}", ix);
        }
    }

    #[test]
    fn unpack_rejects_bad_data() {
        assert!(matches!(
            MarketInstruction::unpack(&[]),
            Err(DexError::TruncatedBuffer { .. })
        ));
        assert_eq!(
            MarketInstruction::unpack(&[1, 5, 0, 0, 0]),
            Err(DexError::UnknownVariant {
                kind: "instruction version",
                tag: 1
            })
        );
        assert_eq!(
            MarketInstruction::unpack(&[0, 42, 0, 0, 0]),
            Err(DexError::UnknownVariant {
                kind: "instruction",
                tag: 42
            })
        );
        assert!(matches!(
            MarketInstruction::unpack(&[0, 2, 0, 0, 0, 1]),
            Err(DexError::TruncatedBuffer { .. })
        ));
        assert!(matches!(
            MarketInstruction::unpack(&[0, 5, 0, 0, 0, 1]),
            Err(DexError::MalformedInstruction(_))
        ));
        let mut bad_side = MarketInstruction::MatchOrders(1).pack().unwrap();
        bad_side[1] = 1;
        bad_side.extend_from_slice(&[0; 30]);
        bad_side[5] = 9;
        assert_eq!(
            MarketInstruction::unpack(&bad_side),
            Err(DexError::UnknownVariant {
                kind: "instruction payload",
                tag: 1
            })
        );
    }

    #[test]
    fn builders_attach_accounts() {
        let program_id = Pubkey::new_unique();
        let keys: Vec<Pubkey> = (0..8).map(|_| Pubkey::new_unique()).collect();
        let ix = settle_funds(
            program_id,
            settle_funds::Accounts {
                market: &keys[0],
                open_orders: &keys[1],
                owner: &keys[2],
                base_vault: &keys[3],
                quote_vault: &keys[4],
                base_wallet: &keys[5],
                quote_wallet: &keys[6],
                vault_signer: &keys[7],
            },
        )
        .unwrap();
        assert_eq!(ix.program_id, program_id);
        assert_eq!(ix.accounts.len(), 9);
        assert!(ix.accounts[2].is_signer);
        assert!(!ix.accounts[7].is_writable);
        assert_eq!(ix.accounts[8].pubkey, spl_token::ID);

        let open_orders = [keys[0], keys[1]];
        let ix = consume_events(
            program_id,
            consume_events::Accounts {
                open_orders: &open_orders,
                market: &keys[2],
                event_queue: &keys[3],
                base_vault: &keys[4],
                quote_vault: &keys[5],
            },
            5,
        )
        .unwrap();
        assert_eq!(ix.accounts.len(), 6);
        assert_eq!(ix.accounts[2].pubkey, keys[2]);
        assert_eq!(ix.data, vec![0, 3, 0, 0, 0, 5, 0]);
    }
}
