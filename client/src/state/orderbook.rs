use crate::error::DexResult;
use crate::state::critbit::{LeafNode, Slab};
use crate::state::Side;

/// One side of the book, best price first.
///
/// Bids come out price descending and asks price ascending. Within a price
/// level, older orders come first on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBook {
    side: Side,
    leaves: Vec<LeafNode>,
}

/// Aggregated quantity resting at one price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    /// In quote lots per base lot
    pub price: u64,
    /// In base lots
    pub quantity: u64,
    /// Orders resting at this price
    pub order_count: usize,
}

impl OrderBook {
    /// Collect the leaves of `slab` best first.
    pub fn from_slab(slab: &Slab, side: Side) -> DexResult<Self> {
        let leaves = slab.leaves(side == Side::Bid)?;
        Ok(Self { side, leaves })
    }

    /// Decode a full bids or asks account.
    pub fn from_account(data: &[u8], side: Side) -> DexResult<Self> {
        Self::from_slab(&Slab::from_account(data, side)?, side)
    }

    /// The side this book was read from
    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of resting orders
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// No orders rest on this side
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Orders, best first
    pub fn iter(&self) -> std::slice::Iter<'_, LeafNode> {
        self.leaves.iter()
    }

    /// The order at the top of the book
    pub fn best(&self) -> Option<&LeafNode> {
        self.leaves.first()
    }

    /// Price of [`OrderBook::best`]
    pub fn best_price(&self) -> Option<u64> {
        self.best().map(LeafNode::price)
    }

    /// Aggregate the first `depth` price levels. Quantities saturate.
    pub fn l2_depth(&self, depth: usize) -> Vec<PriceLevel> {
        let mut levels: Vec<PriceLevel> = Vec::with_capacity(depth.min(self.leaves.len()));
        for leaf in &self.leaves {
            match levels.last_mut() {
                Some(level) if level.price == leaf.price() => {
                    level.quantity = level.quantity.saturating_add(leaf.quantity);
                    level.order_count += 1;
                }
                _ => {
                    if levels.len() == depth {
                        break;
                    }
                    levels.push(PriceLevel {
                        price: leaf.price(),
                        quantity: leaf.quantity,
                        order_count: 1,
                    });
                }
            }
        }
        levels
    }

    /// Take the orders, best first
    pub fn into_leaves(self) -> Vec<LeafNode> {
        self.leaves
    }
}

impl IntoIterator for OrderBook {
    type Item = LeafNode;
    type IntoIter = std::vec::IntoIter<LeafNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.leaves.into_iter()
    }
}

impl<'a> IntoIterator for &'a OrderBook {
    type Item = &'a LeafNode;
    type IntoIter = std::slice::Iter<'a, LeafNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.leaves.iter()
    }
}

/// This util is used to return the orderbook's spread `(best_bid_price, best_ask_price)` in quote lots
pub fn get_spread(bids: &OrderBook, asks: &OrderBook) -> (Option<u64>, Option<u64>) {
    (bids.best_price(), asks.best_price())
}
