//! Longest-prefix match over the on-disk network trie

use super::address::{BitPath, ADDRESS_BITS};
use super::format::Record;
use super::record::TrieNode;
use super::search::Table;
use super::source::ByteSource;
use crate::error::{LocError, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Bounded cache of decoded nodes keyed by absolute file offset
pub struct NodeCache {
    nodes: Mutex<LruCache<u64, TrieNode>>,
}

impl NodeCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            nodes: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn get(&self, offset: u64) -> Option<TrieNode> {
        self.nodes.lock().ok()?.get(&offset).copied()
    }

    fn put(&self, offset: u64, node: TrieNode) {
        if let Ok(mut nodes) = self.nodes.lock() {
            nodes.put(offset, node);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().map(|n| n.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a successful descent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieMatch {
    /// Index into the network data table
    pub network: u32,
    /// Bits consumed up to and including the matched leaf
    pub prefix_len: u8,
}

/// View of the network tree section
pub struct NetworkTree<'a> {
    offset: u64,
    nodes: Table<'a, TrieNode>,
    cache: Option<&'a NodeCache>,
}

impl<'a> NetworkTree<'a> {
    pub fn new(source: &'a dyn ByteSource, offset: u64, length: u64, cache: Option<&'a NodeCache>) -> Self {
        Self {
            offset,
            nodes: Table::new(source, offset, length),
            cache,
        }
    }

    pub fn node_count(&self) -> u64 {
        self.nodes.len()
    }

    /// Node at `index`, served from the cache when possible
    pub fn node(&self, index: u32) -> Result<TrieNode> {
        if index as u64 >= self.nodes.len() {
            return Err(LocError::corrupted(format!(
                "trie node index {} out of range ({} nodes)",
                index,
                self.nodes.len()
            )));
        }

        let offset = self.offset + index as u64 * TrieNode::SIZE as u64;
        if let Some(node) = self.cache.and_then(|c| c.get(offset)) {
            return Ok(node);
        }

        let node = self.nodes.get(index as u64)?;
        if let Some(cache) = self.cache {
            cache.put(offset, node);
        }
        Ok(node)
    }

    /// Most specific network covering `path`, if any
    pub fn lookup(&self, path: &BitPath) -> Result<Option<TrieMatch>> {
        let mut chain: Vec<TrieNode> = Vec::with_capacity(ADDRESS_BITS as usize);
        let mut index = 0u32;

        for bit in path.bits() {
            let node = self.node(index)?;
            chain.push(node);

            let next = node.child(bit);
            if next > 0 {
                index = next;
                continue;
            }

            // Dead end: fall back to the deepest ancestor carrying data.
            while let Some(previous) = chain.pop() {
                if previous.is_leaf() {
                    return Ok(Some(TrieMatch {
                        network: previous.network,
                        prefix_len: chain.len() as u8,
                    }));
                }
            }
            return Ok(None);
        }

        // Every bit had a child; only the final node itself can match.
        let node = self.node(index)?;
        if node.is_leaf() {
            return Ok(Some(TrieMatch {
                network: node.network,
                prefix_len: path.len(),
            }));
        }
        Ok(None)
    }

    /// Depth-first walk over every node carrying network data, lowest prefix first
    pub fn leaves(self) -> Leaves<'a> {
        let stack = if self.nodes.is_empty() {
            Vec::new()
        } else {
            vec![(0u32, BitPath::new())]
        };
        Leaves { tree: self, stack }
    }
}

/// Iterator over `(prefix, node)` pairs for all leaves; stops after the first error
pub struct Leaves<'a> {
    tree: NetworkTree<'a>,
    stack: Vec<(u32, BitPath)>,
}

impl Leaves<'_> {
    fn step(&mut self) -> Result<Option<(BitPath, TrieNode)>> {
        while let Some((index, path)) = self.stack.pop() {
            let node = self.tree.node(index)?;

            if node.zero > 0 || node.one > 0 {
                if path.len() >= ADDRESS_BITS {
                    return Err(LocError::corrupted(format!(
                        "trie node {} has children below full address width",
                        index
                    )));
                }
                if node.one > 0 {
                    self.stack.push((node.one, path.with(true)));
                }
                if node.zero > 0 {
                    self.stack.push((node.zero, path.with(false)));
                }
            }

            if node.is_leaf() {
                return Ok(Some((path, node)));
            }
        }
        Ok(None)
    }
}

impl Iterator for Leaves<'_> {
    type Item = Result<(BitPath, TrieNode)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(item) => item.map(Ok),
            Err(e) => {
                self.stack.clear();
                Some(Err(e))
            }
        }
    }
}
