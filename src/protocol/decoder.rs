//! Positional decoder for operations messages
//!
//! The frontend is the real consumer of the wire format; this decoder exists
//! so tests and tooling can assert on structure instead of raw integers.

use super::{
    TREE_OPERATION_ADD, TREE_OPERATION_REMOVE, TREE_OPERATION_REMOVE_ROOT,
    TREE_OPERATION_REORDER_CHILDREN, TREE_OPERATION_SET_SUBTREE_MODE,
    TREE_OPERATION_UPDATE_ERRORS_OR_WARNINGS, TREE_OPERATION_UPDATE_TREE_BASE_DURATION,
};
use crate::error::{InspectorError, Result};
use crate::types::ElementType;

/// One decoded tree operation
#[derive(Debug, Clone, PartialEq)]
pub enum TreeOperation {
    AddRoot {
        id: u32,
        is_strict: bool,
        profiling_flags: u32,
        supports_strict_mode: bool,
        has_owner_metadata: bool,
    },
    Add {
        id: u32,
        element_type: ElementType,
        parent_id: u32,
        owner_id: u32,
        display_name: Option<String>,
        key: Option<String>,
    },
    Remove {
        ids: Vec<u32>,
    },
    RemoveRoot,
    ReorderChildren {
        id: u32,
        children: Vec<u32>,
    },
    UpdateTreeBaseDuration {
        id: u32,
        duration_us: u32,
    },
    UpdateErrorsOrWarnings {
        id: u32,
        errors: u32,
        warnings: u32,
    },
    SetSubtreeMode {
        id: u32,
        mode: u32,
    },
}

/// A fully decoded operations message
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedOperations {
    pub renderer_id: u32,
    pub root_id: u32,
    /// String table, index 0 = string id 1
    pub strings: Vec<String>,
    pub operations: Vec<TreeOperation>,
}

impl DecodedOperations {
    /// Ids added by this message, in order
    pub fn added_ids(&self) -> Vec<u32> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                TreeOperation::AddRoot { id, .. } | TreeOperation::Add { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Ids removed by this message, in order
    pub fn removed_ids(&self) -> Vec<u32> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                TreeOperation::Remove { ids } => Some(ids.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// Cursor over the message words
struct Reader<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn next(&mut self, what: &str) -> Result<u32> {
        let word = self.words.get(self.pos).copied().ok_or_else(|| {
            InspectorError::Protocol(format!(
                "message truncated at word {} while reading {}",
                self.pos, what
            ))
        })?;
        self.pos += 1;
        Ok(word)
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u32]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.words.len());
        let Some(end) = end else {
            return Err(InspectorError::Protocol(format!(
                "message truncated at word {}: {} needs {} words",
                self.pos, what, n
            )));
        };
        let slice = &self.words[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn done(&self) -> bool {
        self.pos >= self.words.len()
    }
}

/// Decode one operations message
pub fn decode_operations(words: &[u32]) -> Result<DecodedOperations> {
    let mut r = Reader { words, pos: 0 };
    let renderer_id = r.next("renderer id")?;
    let root_id = r.next("root id")?;
    let table_size = r.next("string table size")? as usize;

    let table = r.take(table_size, "string table")?;
    let strings = decode_string_table(table)?;

    let lookup = |id: u32| -> Result<Option<String>> {
        if id == 0 {
            return Ok(None);
        }
        strings
            .get(id as usize - 1)
            .cloned()
            .map(Some)
            .ok_or_else(|| InspectorError::Protocol(format!("unknown string id {}", id)))
    };

    let mut operations = Vec::new();
    while !r.done() {
        let at = r.pos;
        let opcode = r.next("opcode")?;
        let op = match opcode {
            TREE_OPERATION_ADD => {
                let id = r.next("ADD id")?;
                let code = r.next("ADD element type")?;
                let element_type = ElementType::from_code(code).ok_or_else(|| {
                    InspectorError::Protocol(format!("unknown element type {} at word {}", code, at))
                })?;
                if element_type == ElementType::Root {
                    let f = r.take(4, "root ADD")?;
                    TreeOperation::AddRoot {
                        id,
                        is_strict: f[0] != 0,
                        profiling_flags: f[1],
                        supports_strict_mode: f[2] != 0,
                        has_owner_metadata: f[3] != 0,
                    }
                } else {
                    let f = r.take(4, "ADD")?;
                    TreeOperation::Add {
                        id,
                        element_type,
                        parent_id: f[0],
                        owner_id: f[1],
                        display_name: lookup(f[2])?,
                        key: lookup(f[3])?,
                    }
                }
            }
            TREE_OPERATION_REMOVE => {
                let count = r.next("REMOVE count")? as usize;
                TreeOperation::Remove {
                    ids: r.take(count, "REMOVE ids")?.to_vec(),
                }
            }
            TREE_OPERATION_REMOVE_ROOT => TreeOperation::RemoveRoot,
            TREE_OPERATION_REORDER_CHILDREN => {
                let id = r.next("REORDER id")?;
                let count = r.next("REORDER count")? as usize;
                TreeOperation::ReorderChildren {
                    id,
                    children: r.take(count, "REORDER children")?.to_vec(),
                }
            }
            TREE_OPERATION_UPDATE_TREE_BASE_DURATION => {
                let f = r.take(2, "UPDATE_TREE_BASE_DURATION")?;
                TreeOperation::UpdateTreeBaseDuration {
                    id: f[0],
                    duration_us: f[1],
                }
            }
            TREE_OPERATION_UPDATE_ERRORS_OR_WARNINGS => {
                let f = r.take(3, "UPDATE_ERRORS_OR_WARNINGS")?;
                TreeOperation::UpdateErrorsOrWarnings {
                    id: f[0],
                    errors: f[1],
                    warnings: f[2],
                }
            }
            TREE_OPERATION_SET_SUBTREE_MODE => {
                let f = r.take(2, "SET_SUBTREE_MODE")?;
                TreeOperation::SetSubtreeMode {
                    id: f[0],
                    mode: f[1],
                }
            }
            other => {
                return Err(InspectorError::Protocol(format!(
                    "unknown opcode {} at word {}",
                    other, at
                )))
            }
        };
        operations.push(op);
    }

    Ok(DecodedOperations {
        renderer_id,
        root_id,
        strings,
        operations,
    })
}

fn decode_string_table(table: &[u32]) -> Result<Vec<String>> {
    let mut r = Reader {
        words: table,
        pos: 0,
    };
    let mut strings = Vec::new();
    while !r.done() {
        let len = r.next("string length")? as usize;
        let codepoints = r.take(len, "string")?;
        let s = codepoints
            .iter()
            .map(|&c| {
                char::from_u32(c).ok_or_else(|| {
                    InspectorError::Protocol(format!("invalid codepoint {:#x} in string table", c))
                })
            })
            .collect::<Result<String>>()?;
        strings.push(s);
    }
    Ok(strings)
}
