//! Binary program header codec.
//!
//! The layout is fixed and independent of the host architecture: a 32-bit
//! big-endian magic, the program name on 128 bytes plus a trailing null
//! (padded to a 4-byte boundary), the 32-bit program size, and the comment on
//! 2048 bytes plus a trailing null (padded the same way).

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecError};
use crate::{COMMENT_LENGTH, COREWAR_EXEC_MAGIC, PROG_NAME_LENGTH};

/// Byte sizes of the header and of its two padded string fields.
///
/// Returns `(header_size, name_field, comment_field)`. Hardcoded alignment
/// rather than `mem::size_of`, so the on-disk format never follows the host.
pub const fn header_struct_size() -> (usize, usize, usize) {
    let align = 4;

    let mut name_field = PROG_NAME_LENGTH + 1;
    if name_field % align != 0 {
        name_field += align - name_field % align;
    }

    let mut comment_field = COMMENT_LENGTH + 1;
    if comment_field % align != 0 {
        comment_field += align - comment_field % align;
    }

    // Magic and program size are 4 bytes each.
    (4 + name_field + 4 + comment_field, name_field, comment_field)
}

/// Fixed-size champion header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramHeader {
    pub magic: u32,
    pub prog_name: String,
    pub prog_size: u32,
    pub comment: String,
}

impl ProgramHeader {
    pub fn new(prog_name: &str, comment: &str, prog_size: u32) -> Result<Self> {
        if prog_name.len() > PROG_NAME_LENGTH {
            return Err(SpecError::NameTooLong {
                len: prog_name.len(),
                max: PROG_NAME_LENGTH,
            });
        }
        if comment.len() > COMMENT_LENGTH {
            return Err(SpecError::CommentTooLong {
                len: comment.len(),
                max: COMMENT_LENGTH,
            });
        }
        Ok(ProgramHeader {
            magic: COREWAR_EXEC_MAGIC,
            prog_name: prog_name.to_string(),
            prog_size,
            comment: comment.to_string(),
        })
    }

    /// Serialize the header to its fixed 2192-byte form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let (header_size, name_field, comment_field) = header_struct_size();
        let mut out = Vec::with_capacity(header_size);

        out.extend_from_slice(&self.magic.to_be_bytes());

        let mut name = vec![0u8; name_field];
        let n = self.prog_name.len().min(PROG_NAME_LENGTH);
        name[..n].copy_from_slice(&self.prog_name.as_bytes()[..n]);
        out.extend_from_slice(&name);

        out.extend_from_slice(&self.prog_size.to_be_bytes());

        let mut comment = vec![0u8; comment_field];
        let n = self.comment.len().min(COMMENT_LENGTH);
        comment[..n].copy_from_slice(&self.comment.as_bytes()[..n]);
        out.extend_from_slice(&comment);

        out
    }

    /// Parse a header from the start of a full binary image.
    ///
    /// The image length is needed to cross-check the recorded program size.
    /// Strict mode turns the magic and size-mismatch warnings into errors.
    pub fn from_bytes(data: &[u8], strict: bool) -> Result<Self> {
        let (header_size, name_field, comment_field) = header_struct_size();
        if data.len() < header_size {
            return Err(SpecError::TruncatedHeader { len: data.len() });
        }

        let mut idx = 0;
        let magic = u32::from_be_bytes(data[idx..idx + 4].try_into().unwrap());
        idx += 4;
        if magic != COREWAR_EXEC_MAGIC {
            if strict {
                return Err(SpecError::InvalidMagic {
                    found: magic,
                    expected: COREWAR_EXEC_MAGIC,
                });
            }
            warn!(
                "invalid magic number: {magic:#x}, expect {:#x}",
                COREWAR_EXEC_MAGIC
            );
        }

        let prog_name = c_str_to_string(&data[idx..idx + name_field]);
        idx += name_field;

        let prog_size = u32::from_be_bytes(data[idx..idx + 4].try_into().unwrap());

        if data.len() <= header_size {
            return Err(SpecError::NoCode);
        }

        let actual = data.len() - header_size;
        if prog_size as usize != actual {
            if strict {
                return Err(SpecError::SizeMismatch {
                    header: prog_size,
                    actual,
                });
            }
            warn!(
                "program size from header doesn't match actual code size, header: {prog_size}, actual: {actual}"
            );
        }

        let comment = c_str_to_string(&data[header_size - comment_field..header_size]);

        Ok(ProgramHeader {
            magic,
            prog_name,
            prog_size,
            comment,
        })
    }
}

fn c_str_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
