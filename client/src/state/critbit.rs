use bytemuck::{Pod, Zeroable};
use num_derive::FromPrimitive;
use solana_program::pubkey::Pubkey;
use tracing::debug;

use crate::error::{DexError, DexResult};
use crate::state::{parse_tag, read_pod, remove_slop, strip_header, AccountFlag, Side};
// A Slab contains the data for a slab header and an array of nodes of a critbit tree
// whose leafs contain the data referencing an order of the orderbook.

/// Index of a node in the slab's arena
pub type NodeHandle = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
/// Bookkeeping stored in front of the node arena.
pub struct SlabHeader {
    /// Next never-used arena slot
    pub bump_index: u64,
    /// Number of slots on the free list
    pub free_list_len: u64,
    /// First slot of the free list
    pub free_list_head: u32,
    /// Only meaningful while `leaf_count > 0`
    pub root_node: u32,
    /// Number of orders in the tree
    pub leaf_count: u64,
}

impl SlabHeader {
    /// Serialized size of the header
    pub const LEN: usize = std::mem::size_of::<Self>();
}

/// A branch of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerNode {
    /// Number of leading key bits shared by every leaf below this node
    pub prefix_len: u32,
    /// Any key below this node; only its first `prefix_len` bits matter
    pub key: u128,
    /// Subtrees whose critical bit is 0 and 1
    pub children: [NodeHandle; 2],
}

impl InnerNode {
    /// The child to follow for `search_key` and the critical bit that chose it.
    ///
    /// `None` when the prefix covers the whole key, which no well formed tree has.
    pub(crate) fn walk_down(&self, search_key: u128) -> Option<(NodeHandle, bool)> {
        let crit_bit_mask = (1u128 << 127).checked_shr(self.prefix_len)?;
        let crit_bit = (search_key & crit_bit_mask) != 0;
        Some((self.children[crit_bit as usize], crit_bit))
    }
}

/// A resting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafNode {
    /// Index of the order in its owner's open orders account
    pub owner_slot: u8,
    /// Fee tier of the owner when the order was placed
    pub fee_tier: u8,
    /// The key is the associated order id
    pub key: u128,
    /// The open orders account holding this order
    pub owner: Pubkey,
    /// Remaining quantity, in base lots
    pub quantity: u64,
    /// Client supplied id, zero when none
    pub client_order_id: u64,
}

impl LeafNode {
    /// Parse a leaf node's price, in quote lots per base lot
    pub fn price(&self) -> u64 {
        (self.key >> 64) as u64
    }

    /// Get the associated order id
    pub fn order_id(&self) -> u128 {
        self.key
    }

    /// The low half of the key. Complemented for bids.
    pub fn sequence_number(&self) -> u64 {
        self.key as u64
    }
}

#[derive(FromPrimitive)]
enum NodeTag {
    Uninitialized = 0,
    Inner = 1,
    Leaf = 2,
    Free = 3,
    LastFree = 4,
}

/// One arena slot as stored: a tag and a payload read according to it.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
struct NodeSlot {
    tag: u32,
    payload: [u8; 68],
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
struct InnerNodePayload {
    prefix_len: u32,
    key: u128,
    children: [u32; 2],
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
struct LeafNodePayload {
    owner_slot: u8,
    fee_tier: u8,
    padding: [u8; 2],
    key: u128,
    owner: [u8; 32],
    quantity: u64,
    client_order_id: u64,
}

/// One arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// Never used
    Uninitialized,
    /// Branch
    Inner(InnerNode),
    /// Order
    Leaf(LeafNode),
    /// Released slot
    Free {
        /// Next slot on the free list
        next: NodeHandle,
    },
    /// Tail of the free list
    LastFree,
}

impl Node {
    /// Every variant occupies the same stride: a u32 tag and a 68 byte payload.
    pub const LEN: usize = std::mem::size_of::<NodeSlot>();

    fn from_slot(slot: &NodeSlot) -> DexResult<Self> {
        let payload = &slot.payload;
        let node = match parse_tag::<NodeTag>(slot.tag, "slab node")? {
            NodeTag::Uninitialized => Node::Uninitialized,
            NodeTag::Inner => {
                let raw: InnerNodePayload = read_pod(payload, 0)?;
                Node::Inner(InnerNode {
                    prefix_len: raw.prefix_len,
                    key: raw.key,
                    children: raw.children,
                })
            }
            NodeTag::Leaf => {
                let raw: LeafNodePayload = read_pod(payload, 0)?;
                Node::Leaf(LeafNode {
                    owner_slot: raw.owner_slot,
                    fee_tier: raw.fee_tier,
                    key: raw.key,
                    owner: Pubkey::new_from_array(raw.owner),
                    quantity: raw.quantity,
                    client_order_id: raw.client_order_id,
                })
            }
            NodeTag::Free => Node::Free {
                next: read_pod(payload, 0)?,
            },
            NodeTag::LastFree => Node::LastFree,
        };
        Ok(node)
    }

    fn to_slot(&self) -> NodeSlot {
        let mut slot = NodeSlot::zeroed();
        let (tag, body) = match self {
            Node::Uninitialized => (NodeTag::Uninitialized, vec![]),
            Node::Inner(inner) => (
                NodeTag::Inner,
                bytemuck::bytes_of(&InnerNodePayload {
                    prefix_len: inner.prefix_len,
                    key: inner.key,
                    children: inner.children,
                })
                .to_vec(),
            ),
            Node::Leaf(leaf) => (
                NodeTag::Leaf,
                bytemuck::bytes_of(&LeafNodePayload {
                    owner_slot: leaf.owner_slot,
                    fee_tier: leaf.fee_tier,
                    padding: [0; 2],
                    key: leaf.key,
                    owner: leaf.owner.to_bytes(),
                    quantity: leaf.quantity,
                    client_order_id: leaf.client_order_id,
                })
                .to_vec(),
            ),
            Node::Free { next } => (NodeTag::Free, next.to_le_bytes().to_vec()),
            Node::LastFree => (NodeTag::LastFree, vec![]),
        };
        slot.tag = tag as u32;
        slot.payload[..body.len()].copy_from_slice(&body);
        slot
    }

    /// The leaf, if this is one
    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// The inner node, if this is one
    pub fn as_inner(&self) -> Option<&InnerNode> {
        match self {
            Node::Inner(inner) => Some(inner),
            _ => None,
        }
    }
}

/// A decoded snapshot of one side of the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slab {
    header: SlabHeader,
    nodes: Vec<Node>,
}

impl Slab {
    /// Decode a slab whose capacity is implied by the buffer length.
    pub fn parse(data: &[u8]) -> DexResult<Self> {
        if data.len() < SlabHeader::LEN {
            return Err(DexError::MalformedSlab {
                len: data.len(),
                reason: "shorter than the slab header",
            });
        }
        if (data.len() - SlabHeader::LEN) % Node::LEN != 0 {
            return Err(DexError::MalformedSlab {
                len: data.len(),
                reason: "not a whole number of nodes",
            });
        }
        Self::parse_with_capacity(data, (data.len() - SlabHeader::LEN) / Node::LEN)
    }

    /// Decode a slab of a declared capacity. The buffer must match it exactly.
    pub fn parse_with_capacity(data: &[u8], capacity: usize) -> DexResult<Self> {
        let expected_len = capacity
            .checked_mul(Node::LEN)
            .and_then(|n| n.checked_add(SlabHeader::LEN));
        if expected_len != Some(data.len()) {
            return Err(DexError::MalformedSlab {
                len: data.len(),
                reason: "length does not match the declared capacity",
            });
        }
        let header: SlabHeader = read_pod(data, 0)?;
        if header.bump_index > capacity as u64 {
            return Err(DexError::MalformedSlab {
                len: data.len(),
                reason: "bump index past the end of the arena",
            });
        }
        let slots: &[NodeSlot] = bytemuck::try_cast_slice(&data[SlabHeader::LEN..]).map_err(
            |_| DexError::MalformedSlab {
                len: data.len(),
                reason: "not a whole number of nodes",
            },
        )?;
        let nodes = slots
            .iter()
            .map(Node::from_slot)
            .collect::<DexResult<Vec<_>>>()?;
        debug!(
            capacity,
            leaf_count = header.leaf_count,
            free_list_len = header.free_list_len,
            "Decoded slab"
        );
        Ok(Self { header, nodes })
    }

    /// Decode the slab out of a full bids or asks account.
    pub fn from_account(data: &[u8], side: Side) -> DexResult<Self> {
        let (_, body) = strip_header(data, AccountFlag::Initialized | side.slab_flag())?;
        Self::parse(remove_slop(body, SlabHeader::LEN, Node::LEN))
    }

    /// Build a slab from already decoded parts.
    pub fn from_parts(header: SlabHeader, nodes: Vec<Node>) -> DexResult<Self> {
        if header.bump_index > nodes.len() as u64 {
            return Err(DexError::MalformedSlab {
                len: SlabHeader::LEN + nodes.len() * Node::LEN,
                reason: "bump index past the end of the arena",
            });
        }
        Ok(Self { header, nodes })
    }

    /// Serialize header and arena back to the stored layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let slots = self.nodes.iter().map(Node::to_slot).collect::<Vec<_>>();
        let mut data = Vec::with_capacity(SlabHeader::LEN + slots.len() * Node::LEN);
        data.extend_from_slice(bytemuck::bytes_of(&self.header));
        data.extend_from_slice(bytemuck::cast_slice(&slots));
        data
    }

    /// The decoded header
    pub fn header(&self) -> &SlabHeader {
        &self.header
    }

    /// Number of arena slots
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// The arena, in slot order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of orders in the tree
    pub fn leaf_count(&self) -> u64 {
        self.header.leaf_count
    }

    /// No orders rest on this side
    pub fn is_empty(&self) -> bool {
        self.header.leaf_count == 0
    }

    /// Root of the tree, `None` while it is empty
    pub fn root(&self) -> Option<NodeHandle> {
        if self.header.leaf_count == 0 {
            None
        } else {
            Some(self.header.root_node)
        }
    }

    /// The node at `handle`, if it is inside the arena
    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle as usize)
    }

    fn node(&self, handle: NodeHandle) -> DexResult<&Node> {
        self.get(handle).ok_or(DexError::CorruptSlab {
            index: handle,
            reason: "node index out of range",
        })
    }

    /// Get a price ascending or price descending iterator over all the Slab's orders
    pub fn iter(&self, descending: bool) -> SlabIterator<'_> {
        SlabIterator {
            slab: self,
            search_stack: self.root().into_iter().collect(),
            visited: vec![false; self.nodes.len()],
            ascending: !descending,
            yielded: 0,
            done: false,
        }
    }

    /// Collect every order in key order, or fail on the first inconsistency.
    pub fn leaves(&self, descending: bool) -> DexResult<Vec<LeafNode>> {
        self.iter(descending)
            .map(|leaf| leaf.map(|l| *l))
            .collect()
    }

    /// Walk the free list from its head.
    pub fn free_list(&self) -> DexResult<Vec<NodeHandle>> {
        let len = self.header.free_list_len;
        if len > self.nodes.len() as u64 {
            return Err(DexError::CorruptSlab {
                index: self.header.free_list_head,
                reason: "free list longer than the arena",
            });
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut chain = Vec::with_capacity(len as usize);
        let mut current = self.header.free_list_head;
        for i in 0..len {
            let node = self.node(current)?;
            if std::mem::replace(&mut visited[current as usize], true) {
                return Err(DexError::CorruptSlab {
                    index: current,
                    reason: "free list revisits a node",
                });
            }
            chain.push(current);
            match node {
                Node::Free { next } if i + 1 < len => current = *next,
                Node::LastFree if i + 1 == len => {}
                Node::LastFree => {
                    return Err(DexError::CorruptSlab {
                        index: current,
                        reason: "free list ends early",
                    })
                }
                // The last link of the chain must be the terminal slot
                Node::Free { .. } => {
                    return Err(DexError::CorruptSlab {
                        index: current,
                        reason: "free list does not end with a terminal node",
                    })
                }
                _ => {
                    return Err(DexError::CorruptSlab {
                        index: current,
                        reason: "free list links to a live node",
                    })
                }
            }
        }
        Ok(chain)
    }

    /// Handle of the leaf whose key is exactly `search_key`.
    pub fn find_by_key(&self, search_key: u128) -> DexResult<Option<NodeHandle>> {
        let mut node_handle = match self.root() {
            Some(r) => r,
            None => return Ok(None),
        };
        for _ in 0..=self.nodes.len() {
            match self.node(node_handle)? {
                Node::Leaf(n) => {
                    return Ok(if n.key == search_key {
                        Some(node_handle)
                    } else {
                        None
                    });
                }
                Node::Inner(n) => {
                    let common_prefix_len = (search_key ^ n.key).leading_zeros();
                    if common_prefix_len < n.prefix_len {
                        return Ok(None);
                    }
                    node_handle = n
                        .walk_down(search_key)
                        .ok_or(DexError::CorruptSlab {
                            index: node_handle,
                            reason: "inner node prefix covers the whole key",
                        })?
                        .0;
                }
                _ => {
                    return Err(DexError::CorruptSlab {
                        index: node_handle,
                        reason: "search reached a node outside the tree",
                    })
                }
            }
        }
        Err(DexError::CorruptSlab {
            index: node_handle,
            reason: "search does not terminate",
        })
    }

    fn find_min_max(&self, find_max: bool) -> DexResult<Option<NodeHandle>> {
        let mut root = match self.root() {
            Some(r) => r,
            None => return Ok(None),
        };
        for _ in 0..=self.nodes.len() {
            match self.node(root)? {
                Node::Leaf(_) => return Ok(Some(root)),
                Node::Inner(node) => root = node.children[find_max as usize],
                _ => {
                    return Err(DexError::CorruptSlab {
                        index: root,
                        reason: "search reached a node outside the tree",
                    })
                }
            }
        }
        Err(DexError::CorruptSlab {
            index: root,
            reason: "search does not terminate",
        })
    }

    /// Handle of the leaf with the smallest key
    pub fn find_min(&self) -> DexResult<Option<NodeHandle>> {
        self.find_min_max(false)
    }

    /// Handle of the leaf with the largest key
    pub fn find_max(&self) -> DexResult<Option<NodeHandle>> {
        self.find_min_max(true)
    }
}

/// In-order walk over the leaves of a [`Slab`], using an explicit stack.
///
/// Yields `Err(CorruptSlab)` once and then stops if the tree revisits a node,
/// leaves the arena, reaches a free slot, or disagrees with `leaf_count`.
pub struct SlabIterator<'a> {
    slab: &'a Slab,
    search_stack: Vec<NodeHandle>,
    visited: Vec<bool>,
    ascending: bool,
    yielded: u64,
    done: bool,
}

impl<'a> SlabIterator<'a> {
    fn visit(&mut self, current: NodeHandle) -> DexResult<Option<&'a LeafNode>> {
        let slab = self.slab;
        let node = slab.node(current)?;
        if std::mem::replace(&mut self.visited[current as usize], true) {
            return Err(DexError::CorruptSlab {
                index: current,
                reason: "tree reaches a node twice",
            });
        }
        match node {
            Node::Inner(n) => {
                self.search_stack.push(n.children[self.ascending as usize]);
                self.search_stack.push(n.children[!self.ascending as usize]);
                Ok(None)
            }
            Node::Leaf(leaf) => Ok(Some(leaf)),
            _ => Err(DexError::CorruptSlab {
                index: current,
                reason: "tree reaches a free or uninitialized node",
            }),
        }
    }
}

impl<'a> Iterator for SlabIterator<'a> {
    type Item = DexResult<&'a LeafNode>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while let Some(current) = self.search_stack.pop() {
            match self.visit(current) {
                Ok(None) => continue,
                Ok(Some(leaf)) => {
                    self.yielded += 1;
                    return Some(Ok(leaf));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.done = true;
        if self.yielded != self.slab.header.leaf_count {
            return Some(Err(DexError::CorruptSlab {
                index: self.slab.header.root_node,
                reason: "leaf count does not match the tree",
            }));
        }
        None
    }
}

/////////////////////////////////////
// Tests

#[cfg(test)]
impl Slab {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            header: SlabHeader::default(),
            nodes: vec![Node::Uninitialized; capacity],
        }
    }

    fn allocate(&mut self, node: Node) -> Option<NodeHandle> {
        if self.header.free_list_len == 0 {
            if self.header.bump_index as usize >= self.nodes.len() {
                return None;
            }
            let key = self.header.bump_index as NodeHandle;
            self.header.bump_index += 1;
            self.nodes[key as usize] = node;
            return Some(key);
        }

        let key = self.header.free_list_head;
        if let Node::Free { next } = self.nodes[key as usize] {
            self.header.free_list_head = next;
        }
        self.header.free_list_len -= 1;
        self.nodes[key as usize] = node;
        Some(key)
    }

    fn free(&mut self, handle: NodeHandle) {
        self.nodes[handle as usize] = if self.header.free_list_len == 0 {
            Node::LastFree
        } else {
            Node::Free {
                next: self.header.free_list_head,
            }
        };
        self.header.free_list_len += 1;
        self.header.free_list_head = handle;
    }

    fn insert_leaf(&mut self, new_leaf: LeafNode) -> Option<NodeHandle> {
        if self.header.leaf_count == 0 {
            let handle = self.allocate(Node::Leaf(new_leaf))?;
            self.header.root_node = handle;
            self.header.leaf_count = 1;
            return Some(handle);
        }
        let mut root = self.header.root_node;
        let mut parent: Option<(NodeHandle, bool)> = None;
        loop {
            let shared_prefix_len = match self.nodes[root as usize] {
                Node::Inner(inner) => {
                    let shared_prefix_len = (inner.key ^ new_leaf.key).leading_zeros();
                    if shared_prefix_len >= inner.prefix_len {
                        let (child, crit_bit) = inner.walk_down(new_leaf.key)?;
                        parent = Some((root, crit_bit));
                        root = child;
                        continue;
                    }
                    shared_prefix_len
                }
                Node::Leaf(leaf) => {
                    if leaf.key == new_leaf.key {
                        // clobber the existing leaf
                        self.nodes[root as usize] = Node::Leaf(new_leaf);
                        return Some(root);
                    }
                    (leaf.key ^ new_leaf.key).leading_zeros()
                }
                _ => unreachable!(),
            };

            // change the root in place to represent the LCA of [new_leaf] and [root]
            let crit_bit_mask: u128 = (1u128 << 127) >> shared_prefix_len;
            let new_leaf_crit_bit = (crit_bit_mask & new_leaf.key) != 0;
            let new_leaf_handle = self.allocate(Node::Leaf(new_leaf))?;
            let mut children = [0; 2];
            children[new_leaf_crit_bit as usize] = new_leaf_handle;
            children[!new_leaf_crit_bit as usize] = root;
            let new_root_handle = self.allocate(Node::Inner(InnerNode {
                prefix_len: shared_prefix_len,
                key: new_leaf.key,
                children,
            }))?;
            match parent {
                Some((p, crit_bit)) => {
                    if let Node::Inner(n) = &mut self.nodes[p as usize] {
                        n.children[crit_bit as usize] = new_root_handle;
                    }
                }
                None => self.header.root_node = new_root_handle,
            }
            self.header.leaf_count += 1;
            return Some(new_leaf_handle);
        }
    }

    fn remove_by_key(&mut self, search_key: u128) -> Option<LeafNode> {
        if self.header.leaf_count == 0 {
            return None;
        }
        let mut grandparent: Option<(NodeHandle, bool)> = None;
        let mut parent: Option<(NodeHandle, bool)> = None;
        let mut current = self.header.root_node;
        loop {
            match self.nodes[current as usize] {
                Node::Inner(inner) => {
                    let (child, crit_bit) = inner.walk_down(search_key)?;
                    grandparent = parent;
                    parent = Some((current, crit_bit));
                    current = child;
                }
                Node::Leaf(leaf) => {
                    if leaf.key != search_key {
                        return None;
                    }
                    // replace parent with its remaining child node
                    match parent {
                        None => self.header.root_node = 0,
                        Some((p, crit_bit)) => {
                            let sibling = self.nodes[p as usize].as_inner().unwrap().children
                                [!crit_bit as usize];
                            match grandparent {
                                Some((g, g_crit_bit)) => {
                                    if let Node::Inner(n) = &mut self.nodes[g as usize] {
                                        n.children[g_crit_bit as usize] = sibling;
                                    }
                                }
                                None => self.header.root_node = sibling,
                            }
                            self.free(p);
                        }
                    }
                    self.header.leaf_count -= 1;
                    self.free(current);
                    return Some(leaf);
                }
                _ => unreachable!(),
            }
        }
    }
}
