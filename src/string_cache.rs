use crate::ChunkOffset;
use crate::binxml::name::BinXmlName;
use crate::err::DeserializationResult;
use crate::utils::ByteCursor;

use hashbrown::HashMap;
use log::{debug, trace};

/// The chunk string table: names keyed by the offset of their on-disk structure.
#[derive(Debug, Default, Clone)]
pub struct StringCache(HashMap<ChunkOffset, BinXmlName, ahash::RandomState>);

impl StringCache {
    pub fn new() -> Self {
        StringCache(HashMap::with_hasher(ahash::RandomState::new()))
    }

    /// Reads every string reachable from `offsets`, following each bucket's `next_string` chain.
    /// Zero offsets denote empty buckets.
    pub fn populate(&mut self, data: &[u8], offsets: &[ChunkOffset]) -> DeserializationResult<usize> {
        let before = self.0.len();

        for &offset in offsets.iter().filter(|&&offset| offset > 0) {
            let mut next = Some(offset);

            while let Some(string_position) = next {
                if self.0.contains_key(&string_position) {
                    break;
                }

                let mut cursor = ByteCursor::with_pos(data, string_position as usize, 0)?;
                let (link, name) = BinXmlName::from_cursor(&mut cursor)?;
                self.0.insert(string_position, name);

                trace!("\tNext string will be at {:?}", link.next_string);
                next = link.next_string;
            }
        }

        let added = self.0.len() - before;
        debug!("Loaded {} strings into the string table", added);
        Ok(added)
    }

    pub fn insert(&mut self, offset: ChunkOffset, name: BinXmlName) {
        self.0.insert(offset, name);
    }

    pub fn get_cached_string(&self, offset: ChunkOffset) -> Option<&BinXmlName> {
        self.0.get(&offset)
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn push_name(buf: &mut Vec<u8>, next: u32, s: &str) -> u32 {
        let at = buf.len() as u32;
        buf.extend_from_slice(&next.to_le_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
        for u in s.encode_utf16() {
            buf.extend_from_slice(&u.to_le_bytes());
        }
        buf.extend_from_slice(&[0, 0]);
        at
    }

    #[test]
    fn test_populate_follows_bucket_chain() {
        let mut buf = vec![0_u8; 8];
        // "Provider" (at 8) links to "Level", which ends the chain.
        let level_at = 8 + 6 + 2 + 2 * 8 + 2;
        let provider_at = push_name(&mut buf, level_at, "Provider");
        assert_eq!(push_name(&mut buf, 0, "Level"), level_at);

        let mut cache = StringCache::new();
        assert_eq!(cache.populate(&buf, &[0, provider_at]).unwrap(), 2);

        assert_eq!(cache.get_cached_string(provider_at).unwrap().as_str(), "Provider");
        assert_eq!(cache.get_cached_string(level_at).unwrap().as_str(), "Level");
        assert_eq!(cache.populate(&buf, &[provider_at]).unwrap(), 0);
    }

    #[test]
    fn test_populate_rejects_offsets_past_end() {
        let mut cache = StringCache::new();
        assert!(cache.populate(&[0_u8; 4], &[64]).is_err());
        assert!(cache.is_empty());
    }
}
