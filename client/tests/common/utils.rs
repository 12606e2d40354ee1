use enumflags2::BitFlags;
use serum_dex_client::client::{
    AccountFetcher, Confirmation, FetchError, SubmissionError, TransactionSignature,
    TransactionSubmitter,
};
use serum_dex_client::state::{
    pad_account, AccountFlag, InnerNode, LeafNode, MarketLayout, MarketState, Node, NodeHandle,
    Queue, QueueRecord, Side, Slab, SlabHeader,
};
use solana_program::instruction::Instruction;
use solana_program::pubkey::Pubkey;
use std::cell::RefCell;
use std::collections::HashMap;

/// Serves account data from memory.
#[derive(Default)]
pub struct InMemoryFetcher {
    pub accounts: RefCell<HashMap<Pubkey, Vec<u8>>>,
    pub offline: bool,
}

impl InMemoryFetcher {
    pub fn insert(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.borrow_mut().insert(address, data);
    }
}

impl AccountFetcher for InMemoryFetcher {
    fn fetch_account_bytes(&self, address: &Pubkey) -> Result<Vec<u8>, FetchError> {
        if self.offline {
            return Err(FetchError::Network("connection refused".to_owned()));
        }
        self.accounts
            .borrow()
            .get(address)
            .cloned()
            .ok_or(FetchError::NotFound(*address))
    }
}

/// Records every submitted transaction and hands out sequential signatures.
#[derive(Default)]
pub struct RecordingSubmitter {
    pub submitted: RefCell<Vec<(Vec<Instruction>, Vec<Pubkey>)>>,
    pub reject_with: Option<String>,
}

impl RecordingSubmitter {
    pub fn last_instruction(&self) -> Instruction {
        self.submitted.borrow().last().unwrap().0[0].clone()
    }

    pub fn last_signers(&self) -> Vec<Pubkey> {
        self.submitted.borrow().last().unwrap().1.clone()
    }
}

impl TransactionSubmitter for RecordingSubmitter {
    fn submit_transaction(
        &self,
        instructions: &[Instruction],
        signers: &[Pubkey],
    ) -> Result<TransactionSignature, SubmissionError> {
        if let Some(reason) = &self.reject_with {
            return Err(SubmissionError::Rejected(reason.clone()));
        }
        let mut submitted = self.submitted.borrow_mut();
        submitted.push((instructions.to_vec(), signers.to_vec()));
        Ok(TransactionSignature(format!("sig-{}", submitted.len())))
    }

    fn confirm_transaction(
        &self,
        signature: &TransactionSignature,
    ) -> Result<Confirmation, SubmissionError> {
        let known = self.submitted.borrow().len();
        Ok(if signature.0 == format!("sig-{}", known) {
            Confirmation::Confirmed
        } else {
            Confirmation::TimedOut
        })
    }
}

/// The addresses a test market lives at
pub struct MarketAccounts {
    pub program_id: Pubkey,
    pub market: Pubkey,
    pub state: MarketState,
}

/// A v2 market with base lots of 100 and quote lots of 10.
pub fn sample_market() -> MarketAccounts {
    let program_id = Pubkey::new_unique();
    let market = Pubkey::new_unique();
    let vault_signer_nonce = (0..100u64)
        .find(|nonce| {
            Pubkey::create_program_address(&[market.as_ref(), &nonce.to_le_bytes()], &program_id)
                .is_ok()
        })
        .unwrap();
    let state = MarketState {
        layout: MarketLayout::V2,
        account_flags: AccountFlag::Initialized | AccountFlag::Market,
        own_address: market,
        vault_signer_nonce,
        base_mint: Pubkey::new_unique(),
        quote_mint: Pubkey::new_unique(),
        base_vault: Pubkey::new_unique(),
        base_deposits_total: 0,
        base_fees_accrued: 0,
        quote_vault: Pubkey::new_unique(),
        quote_deposits_total: 0,
        quote_fees_accrued: 0,
        quote_dust_threshold: 100,
        request_queue: Pubkey::new_unique(),
        event_queue: Pubkey::new_unique(),
        bids: Pubkey::new_unique(),
        asks: Pubkey::new_unique(),
        base_lot_size: 100,
        quote_lot_size: 10,
        fee_rate_bps: 22,
        referrer_rebates_accrued: 0,
    };
    MarketAccounts {
        program_id,
        market,
        state,
    }
}

pub fn leaf(price: u64, seq: u64, side: Side, quantity: u64, owner: Pubkey) -> LeafNode {
    let seq = match side {
        Side::Bid => !seq,
        Side::Ask => seq,
    };
    LeafNode {
        owner_slot: (seq % 128) as u8,
        fee_tier: 0,
        key: ((price as u128) << 64) | seq as u128,
        owner,
        quantity,
        client_order_id: 0,
    }
}

fn build_tree(leaves: &[LeafNode], nodes: &mut Vec<Node>) -> NodeHandle {
    if leaves.len() == 1 {
        nodes.push(Node::Leaf(leaves[0]));
        return (nodes.len() - 1) as NodeHandle;
    }
    let first = leaves[0].key;
    let last = leaves[leaves.len() - 1].key;
    let prefix_len = (first ^ last).leading_zeros();
    let mask = (1u128 << 127) >> prefix_len;
    let split = leaves.iter().position(|l| l.key & mask != 0).unwrap();
    let handle = nodes.len();
    nodes.push(Node::Uninitialized);
    let left = build_tree(&leaves[..split], nodes);
    let right = build_tree(&leaves[split..], nodes);
    nodes[handle] = Node::Inner(InnerNode {
        prefix_len,
        key: first,
        children: [left, right],
    });
    handle as NodeHandle
}

/// A well formed slab holding `leaves`, with `spare` unused slots.
pub fn slab_with(mut leaves: Vec<LeafNode>, spare: usize) -> Slab {
    leaves.sort_by_key(|l| l.key);
    let mut nodes = vec![];
    let root = if leaves.is_empty() {
        0
    } else {
        build_tree(&leaves, &mut nodes)
    };
    let bump_index = nodes.len() as u64;
    nodes.extend(std::iter::repeat(Node::Uninitialized).take(spare));
    let header = SlabHeader {
        bump_index,
        free_list_len: 0,
        free_list_head: 0,
        root_node: root,
        leaf_count: leaves.len() as u64,
    };
    Slab::from_parts(header, nodes).unwrap()
}

/// Wrap a slab into a bids or asks account, with a few bytes of slop.
pub fn slab_account(slab: &Slab, side: Side) -> Vec<u8> {
    let flags = AccountFlag::Initialized | side.slab_flag();
    let mut body = flags.bits().to_le_bytes().to_vec();
    body.extend_from_slice(&slab.to_bytes());
    body.extend_from_slice(&[0; 5]);
    pad_account(&body)
}

pub fn queue_account<R: QueueRecord>(
    flag: AccountFlag,
    capacity: usize,
    head: u64,
    records: Vec<R>,
) -> Vec<u8> {
    let flags: BitFlags<AccountFlag> = AccountFlag::Initialized | flag;
    let queue = Queue::from_records(capacity, head, 0, flags, records).unwrap();
    pad_account(&queue.to_bytes())
}
