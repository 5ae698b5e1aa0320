//! Per-flush string table

use indexmap::IndexMap;

/// Maps strings to small ids for one flush
///
/// Id 0 stands for "no string". Strings are stored as Unicode scalar values,
/// so lengths count characters rather than UTF-16 units.
#[derive(Debug, Default, Clone)]
pub struct StringInterner {
    table: IndexMap<String, Interned>,
    /// Number of integers the table occupies on the wire
    encoded_len: usize,
}

#[derive(Debug, Clone)]
struct Interned {
    id: u32,
    codepoints: Vec<u32>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `s`, allocating the next one on first use
    pub fn intern(&mut self, s: Option<&str>) -> u32 {
        let Some(s) = s else {
            return 0;
        };
        if let Some(entry) = self.table.get(s) {
            return entry.id;
        }

        let id = self.table.len() as u32 + 1;
        let codepoints: Vec<u32> = s.chars().map(|c| c as u32).collect();
        self.encoded_len += 1 + codepoints.len();
        self.table.insert(s.to_string(), Interned { id, codepoints });
        id
    }

    /// Wire size of the table, as written in the header
    #[inline]
    pub fn table_size(&self) -> u32 {
        self.encoded_len as u32
    }

    /// Append `(len, codepoints...)` for every string, in id order
    pub fn encode_into(&self, out: &mut Vec<u32>) {
        for entry in self.table.values() {
            out.push(entry.codepoints.len() as u32);
            out.extend_from_slice(&entry.codepoints);
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.encoded_len = 0;
    }
}
