//! A loaded market bound to the collaborators that read and write the chain.

use solana_program::{instruction::Instruction, pubkey::Pubkey};
use tracing::{debug, info};

use crate::client::{AccountFetcher, Confirmation, TransactionSignature, TransactionSubmitter};
use crate::config::ClientConfig;
use crate::error::DexResult;
use crate::instruction::{
    self, cancel_order, consume_events, match_orders, new_order, settle_funds,
};
use crate::state::{
    AccountFlag, EventQueue, LeafNode, MarketState, OpenOrders, OrderBook, OrderType,
    RequestQueue, Side,
};
use crate::utils::{price_to_lots, quantity_to_lots};

/// Arguments of [`Market::place_order`], in native units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRequest {
    /// Buy or sell
    pub side: Side,
    /// How the order meets the book
    pub order_type: OrderType,
    /// Native quote units per whole base lot
    pub limit_price: u64,
    /// Native base units
    pub max_quantity: u64,
    /// Zero means none
    pub client_id: u64,
}

/// The wallets that fund and receive a settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleAccounts {
    /// The open orders account holding the free balances
    pub open_orders: Pubkey,
    /// Receives base tokens
    pub base_wallet: Pubkey,
    /// Receives quote tokens
    pub quote_wallet: Pubkey,
}

/// A decoded market account together with the fetcher that reads its
/// companion accounts and the submitter that sends its instructions.
pub struct Market<F, S> {
    address: Pubkey,
    program_id: Pubkey,
    state: MarketState,
    config: ClientConfig,
    fetcher: F,
    submitter: S,
}

impl<F: AccountFetcher, S: TransactionSubmitter> Market<F, S> {
    /// Fetch and decode the market account at `address`.
    pub fn load(
        fetcher: F,
        submitter: S,
        address: Pubkey,
        program_id: Pubkey,
        config: ClientConfig,
    ) -> DexResult<Self> {
        let state = MarketState::parse(&fetcher.fetch_account_bytes(&address)?)?;
        info!(market = %address, base_mint = %state.base_mint, quote_mint = %state.quote_mint, "Loaded market");
        Ok(Self {
            address,
            program_id,
            state,
            config,
            fetcher,
            submitter,
        })
    }

    /// Refetch the market account. The current state is kept on error.
    pub fn reload(&mut self) -> DexResult {
        self.state = MarketState::parse(&self.fetcher.fetch_account_bytes(&self.address)?)?;
        Ok(())
    }

    /// Address of the market account
    pub fn address(&self) -> &Pubkey {
        &self.address
    }

    /// The DEX program owning the market
    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// The state as of the last load or reload
    pub fn state(&self) -> &MarketState {
        &self.state
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn load_book(&self, side: Side) -> DexResult<OrderBook> {
        let address = match side {
            Side::Bid => &self.state.bids,
            Side::Ask => &self.state.asks,
        };
        let book = OrderBook::from_account(&self.fetcher.fetch_account_bytes(address)?, side)?;
        debug!(market = %self.address, ?side, orders = book.len(), "Loaded order book");
        Ok(book)
    }

    /// Resting bids, highest price first
    pub fn load_bids(&self) -> DexResult<OrderBook> {
        self.load_book(Side::Bid)
    }

    /// Resting asks, lowest price first
    pub fn load_asks(&self) -> DexResult<OrderBook> {
        self.load_book(Side::Ask)
    }

    /// Fetch and decode the event queue
    pub fn load_event_queue(&self) -> DexResult<EventQueue> {
        let data = self.fetcher.fetch_account_bytes(&self.state.event_queue)?;
        EventQueue::from_account(&data, AccountFlag::EventQueue)
    }

    /// Fetch and decode the request queue
    pub fn load_request_queue(&self) -> DexResult<RequestQueue> {
        let data = self.fetcher.fetch_account_bytes(&self.state.request_queue)?;
        RequestQueue::from_account(&data, AccountFlag::RequestQueue)
    }

    /// Fetch and decode the open orders account at `address`
    pub fn load_open_orders(&self, address: &Pubkey) -> DexResult<OpenOrders> {
        OpenOrders::parse(&self.fetcher.fetch_account_bytes(address)?)
    }

    fn submit(
        &self,
        name: &'static str,
        instruction: Instruction,
        signers: &[Pubkey],
    ) -> DexResult<TransactionSignature> {
        let signature = self
            .submitter
            .submit_transaction(&[instruction], signers)?;
        info!(market = %self.address, instruction = name, %signature, "Submitted transaction");
        Ok(signature)
    }

    /// Convert a native order into lots and push it onto the request queue.
    ///
    /// `payer` is the token account the order locks funds from.
    pub fn place_order(
        &self,
        order: OrderRequest,
        owner: &Pubkey,
        open_orders: &Pubkey,
        payer: &Pubkey,
    ) -> DexResult<TransactionSignature> {
        let limit_price = price_to_lots(
            order.limit_price,
            self.state.quote_lot_size,
            order.side,
            self.config.rounding,
        )?;
        let max_quantity =
            quantity_to_lots(order.max_quantity, self.state.base_lot_size, self.config.rounding)?;
        let ix = instruction::new_order(
            self.program_id,
            new_order::Accounts {
                market: &self.address,
                open_orders,
                request_queue: &self.state.request_queue,
                payer,
                owner,
                base_vault: &self.state.base_vault,
                quote_vault: &self.state.quote_vault,
            },
            new_order::Params {
                side: order.side,
                limit_price,
                max_quantity,
                order_type: order.order_type,
                client_id: order.client_id,
            },
        )?;
        self.submit("new_order", ix, &[*owner])
    }

    /// Request the cancellation of a resting order.
    ///
    /// `side` is the side of the book the order was read from, see [`OrderBook::side`].
    pub fn cancel_order(
        &self,
        owner: &Pubkey,
        side: Side,
        order: &LeafNode,
    ) -> DexResult<TransactionSignature> {
        let ix = instruction::cancel_order(
            self.program_id,
            cancel_order::Accounts {
                market: &self.address,
                open_orders: &order.owner,
                request_queue: &self.state.request_queue,
                owner,
            },
            cancel_order::Params {
                side,
                order_id: order.order_id(),
                open_orders: order.owner.to_bytes(),
                open_orders_slot: order.owner_slot,
            },
        )?;
        self.submit("cancel_order", ix, &[*owner])
    }

    /// Cancel the order `owner` placed with `client_id`.
    pub fn cancel_order_by_client_id(
        &self,
        owner: &Pubkey,
        open_orders: &Pubkey,
        client_id: u64,
    ) -> DexResult<TransactionSignature> {
        let ix = instruction::cancel_order_by_client_id(
            self.program_id,
            cancel_order::Accounts {
                market: &self.address,
                open_orders,
                request_queue: &self.state.request_queue,
                owner,
            },
            client_id,
        )?;
        self.submit("cancel_order_by_client_id", ix, &[*owner])
    }

    /// Match up to `limit` requests, or the configured default.
    pub fn match_orders(
        &self,
        fee_payer: &Pubkey,
        limit: Option<u16>,
    ) -> DexResult<TransactionSignature> {
        let ix = instruction::match_orders(
            self.program_id,
            match_orders::Accounts {
                market: &self.address,
                request_queue: &self.state.request_queue,
                event_queue: &self.state.event_queue,
                bids: &self.state.bids,
                asks: &self.state.asks,
                base_vault: &self.state.base_vault,
                quote_vault: &self.state.quote_vault,
            },
            limit.unwrap_or(self.config.match_limit),
        )?;
        self.submit("match_orders", ix, &[*fee_payer])
    }

    /// Pop up to `limit` events, or the configured default, crediting `open_orders`.
    pub fn consume_events(
        &self,
        fee_payer: &Pubkey,
        open_orders: &[Pubkey],
        limit: Option<u16>,
    ) -> DexResult<TransactionSignature> {
        let mut open_orders = open_orders.to_vec();
        open_orders.sort();
        open_orders.dedup();
        let ix = instruction::consume_events(
            self.program_id,
            consume_events::Accounts {
                open_orders: &open_orders,
                market: &self.address,
                event_queue: &self.state.event_queue,
                base_vault: &self.state.base_vault,
                quote_vault: &self.state.quote_vault,
            },
            limit.unwrap_or(self.config.consume_events_limit),
        )?;
        self.submit("consume_events", ix, &[*fee_payer])
    }

    /// Withdraw the free balances of `accounts.open_orders`.
    pub fn settle_funds(
        &self,
        owner: &Pubkey,
        accounts: SettleAccounts,
    ) -> DexResult<TransactionSignature> {
        let vault_signer = self.state.vault_signer(&self.program_id)?;
        let ix = instruction::settle_funds(
            self.program_id,
            settle_funds::Accounts {
                market: &self.address,
                open_orders: &accounts.open_orders,
                owner,
                base_vault: &self.state.base_vault,
                quote_vault: &self.state.quote_vault,
                base_wallet: &accounts.base_wallet,
                quote_wallet: &accounts.quote_wallet,
                vault_signer: &vault_signer,
            },
        )?;
        self.submit("settle_funds", ix, &[*owner])
    }

    /// Ask the submitter whether `signature` landed.
    pub fn confirm_transaction(&self, signature: &TransactionSignature) -> DexResult<Confirmation> {
        Ok(self.submitter.confirm_transaction(signature)?)
    }
}
