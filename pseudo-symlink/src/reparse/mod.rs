//! SUMMARY:
//! Encode and decode the mount-point reparse data exchanged with the filesystem driver.
//!
//! OVERVIEW:
//! The buffer layout is the mount-point arm of `REPARSE_DATA_BUFFER`:
//!
//! ```text
//! 0x00  u32  ReparseTag            (IO_REPARSE_TAG_MOUNT_POINT)
//! 0x04  u16  ReparseDataLength     (bytes following the 8-byte header)
//! 0x06  u16  Reserved
//! 0x08  u16  SubstituteNameOffset  (relative to PathBuffer)
//! 0x0A  u16  SubstituteNameLength  (bytes, no terminator)
//! 0x0C  u16  PrintNameOffset
//! 0x0E  u16  PrintNameLength
//! 0x10  [u8; 0x3FF0] PathBuffer    (UTF-16LE)
//! ```
//!
//! All multi-byte fields are little-endian. The codec works on plain byte slices, so no
//! alignment or `unsafe` reinterpretation is needed on either side of the native call.
use crate::error::LinkError;
use crate::Result;

/// Reparse tag identifying a mount point (junction).
pub const IO_REPARSE_TAG_MOUNT_POINT: u32 = 0xA000_0003;

/// Size of the generic header (`ReparseTag`, `ReparseDataLength`, `Reserved`).
pub const REPARSE_DATA_BUFFER_HEADER_SIZE: usize = 8;

/// Size of the mount-point specific fields preceding `PathBuffer`.
pub const MOUNT_POINT_FIELDS_SIZE: usize = 8;

/// Largest reparse buffer the filesystem accepts or returns.
pub const MAXIMUM_REPARSE_DATA_BUFFER_SIZE: usize = 16 * 1024;

const PATH_BUFFER_OFFSET: usize = REPARSE_DATA_BUFFER_HEADER_SIZE + MOUNT_POINT_FIELDS_SIZE;

/// Bytes reserved for `PathBuffer` in the fixed-size structure (0x3FF0).
pub const PATH_BUFFER_CAPACITY: usize = MAXIMUM_REPARSE_DATA_BUFFER_SIZE - PATH_BUFFER_OFFSET;

const NUL_BYTES: usize = 2;

/// Largest substitute name, in UTF-16 bytes, that still leaves room for the two terminators.
///
/// Names of `PATH_BUFFER_CAPACITY` bytes are rejected: with both NULs written,
/// `ReparseDataLength` would exceed 0x3FF8 and the buffer would overrun the 16 KiB maximum.
pub const MAX_SUBSTITUTE_NAME_BYTES: usize = PATH_BUFFER_CAPACITY - 2 * NUL_BYTES;

/// SUMMARY:
/// Decoded content of a mount-point reparse point.
///
/// DETAILS:
/// Transient value built for each set/get/delete call; nothing is cached between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparseRecord {
    pub tag: u32,
    pub substitute_name: String,
    pub print_name: Option<String>,
}

impl ReparseRecord {
    /// Mount-point record redirecting to `substitute_name`, without a print name.
    pub fn mount_point(substitute_name: impl Into<String>) -> Self {
        Self {
            tag: IO_REPARSE_TAG_MOUNT_POINT,
            substitute_name: substitute_name.into(),
            print_name: None,
        }
    }

    pub fn with_print_name(mut self, print_name: impl Into<String>) -> Self {
        self.print_name = Some(print_name.into());
        self
    }

    /// SUMMARY:
    /// Serialize the record into the fixed-size mount-point structure.
    ///
    /// DETAILS:
    /// The substitute name lands at offset 0 of `PathBuffer`, followed by a UTF-16 NUL.
    /// The print name (possibly empty) follows it, also NUL-terminated. Unused bytes stay zero.
    ///
    /// ERRORS:
    /// - `LinkError::BufferTooLarge`: The names do not fit `PATH_BUFFER_CAPACITY`.
    pub fn encode(&self) -> Result<ReparseBuffer> {
        let substitute = utf16_bytes(&self.substitute_name);
        let print = self.print_name.as_deref().map(utf16_bytes).unwrap_or_default();

        let used = substitute.len() + print.len() + 2 * NUL_BYTES;
        if used > PATH_BUFFER_CAPACITY {
            return Err(LinkError::buffer_too_large(
                substitute.len() + print.len(),
                MAX_SUBSTITUTE_NAME_BYTES,
            ));
        }

        let substitute_len = substitute.len() as u16;
        let print_offset = substitute_len + NUL_BYTES as u16;
        let data_length = (MOUNT_POINT_FIELDS_SIZE + used) as u16;

        let mut bytes = vec![0u8; MAXIMUM_REPARSE_DATA_BUFFER_SIZE];
        bytes[0..4].copy_from_slice(&self.tag.to_le_bytes());
        bytes[4..6].copy_from_slice(&data_length.to_le_bytes());
        bytes[8..10].copy_from_slice(&0u16.to_le_bytes());
        bytes[10..12].copy_from_slice(&substitute_len.to_le_bytes());
        bytes[12..14].copy_from_slice(&print_offset.to_le_bytes());
        bytes[14..16].copy_from_slice(&(print.len() as u16).to_le_bytes());

        let start = PATH_BUFFER_OFFSET;
        bytes[start..start + substitute.len()].copy_from_slice(&substitute);
        let start = PATH_BUFFER_OFFSET + print_offset as usize;
        bytes[start..start + print.len()].copy_from_slice(&print);

        Ok(ReparseBuffer {
            bytes,
            len: REPARSE_DATA_BUFFER_HEADER_SIZE + data_length as usize,
        })
    }
}

/// SUMMARY:
/// Fixed-size reparse structure plus the length that is submitted to the driver.
///
/// DETAILS:
/// The backing storage always spans `MAXIMUM_REPARSE_DATA_BUFFER_SIZE` bytes. The driver
/// validates that the input length equals `ReparseDataLength + 8`, so `as_bytes` returns
/// only that prefix while `as_full_bytes` exposes the whole structure.
#[derive(Clone, PartialEq, Eq)]
pub struct ReparseBuffer {
    bytes: Vec<u8>,
    len: usize,
}

impl ReparseBuffer {
    /// Bytes to submit with the set/delete control codes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[inline]
    pub fn as_full_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn tag(&self) -> u32 {
        read_u32(&self.bytes, 0)
    }

    #[inline]
    pub fn reparse_data_length(&self) -> u16 {
        read_u16(&self.bytes, 4)
    }
}

impl std::fmt::Debug for ReparseBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReparseBuffer")
            .field("tag", &format_args!("{:#010x}", self.tag()))
            .field("reparse_data_length", &self.reparse_data_length())
            .field("len", &self.len)
            .finish()
    }
}

/// SUMMARY:
/// Build the mount-point buffer redirecting to `target_path`.
///
/// PARAMETERS:
/// - `target_path` (`&str`): Native substitute name, e.g. `\RPC Control` or `\??\C:\dir`.
///
/// RETURNS:
/// - `Result<ReparseBuffer>`: `ReparseDataLength` = UTF-16 length + 12,
///   `SubstituteNameOffset` = 0, `PrintNameOffset` = UTF-16 length + 2, `PrintNameLength` = 0.
///
/// ERRORS:
/// - `LinkError::BufferTooLarge`: `target_path` exceeds `MAX_SUBSTITUTE_NAME_BYTES`.
///
/// EXAMPLE:
/// ```rust
/// use pseudo_symlink::reparse::{decode_mount_point, encode_mount_point};
/// let buffer = encode_mount_point(r"\RPC Control")?;
/// assert_eq!(buffer.reparse_data_length() as usize, r"\RPC Control".len() * 2 + 12);
/// assert_eq!(decode_mount_point(buffer.as_bytes())?.as_deref(), Some(r"\RPC Control"));
/// # Ok::<_, pseudo_symlink::LinkError>(())
/// ```
pub fn encode_mount_point(target_path: &str) -> Result<ReparseBuffer> {
    ReparseRecord::mount_point(target_path).encode()
}

/// SUMMARY:
/// Build the header-only buffer used to delete a mount point.
///
/// RETURNS:
/// - `ReparseBuffer`: tag = mount point, `ReparseDataLength` = 0; `as_bytes` is 8 bytes long.
pub fn encode_empty() -> ReparseBuffer {
    let mut bytes = vec![0u8; MAXIMUM_REPARSE_DATA_BUFFER_SIZE];
    bytes[0..4].copy_from_slice(&IO_REPARSE_TAG_MOUNT_POINT.to_le_bytes());
    ReparseBuffer {
        bytes,
        len: REPARSE_DATA_BUFFER_HEADER_SIZE,
    }
}

/// SUMMARY:
/// Decode a buffer returned by "get reparse point".
///
/// RETURNS:
/// - `Ok(None)`: The tag is not the mount-point tag (another kind of reparse point).
/// - `Ok(Some(record))`: Substitute name and, when non-empty, print name.
///
/// ERRORS:
/// - `LinkError::MalformedReparseBuffer`: The buffer is shorter than its declared fields.
pub fn decode(buffer: &[u8]) -> Result<Option<ReparseRecord>> {
    if buffer.len() < REPARSE_DATA_BUFFER_HEADER_SIZE {
        return Err(LinkError::MalformedReparseBuffer { len: buffer.len() });
    }
    let tag = read_u32(buffer, 0);
    if tag != IO_REPARSE_TAG_MOUNT_POINT {
        return Ok(None);
    }
    if buffer.len() < PATH_BUFFER_OFFSET {
        return Err(LinkError::MalformedReparseBuffer { len: buffer.len() });
    }

    let substitute_name = read_name(buffer, read_u16(buffer, 8), read_u16(buffer, 10))?;
    let print_len = read_u16(buffer, 14);
    let print_name = if print_len == 0 {
        None
    } else {
        Some(read_name(buffer, read_u16(buffer, 12), print_len)?)
    };

    Ok(Some(ReparseRecord {
        tag,
        substitute_name,
        print_name,
    }))
}

/// SUMMARY:
/// Extract the substitute name of a mount-point buffer.
///
/// RETURNS:
/// - `Ok(None)` when the buffer carries a different reparse tag ("not a mount point").
pub fn decode_mount_point(buffer: &[u8]) -> Result<Option<String>> {
    Ok(decode(buffer)?.map(|record| record.substitute_name))
}

fn read_name(buffer: &[u8], offset: u16, length: u16) -> Result<String> {
    let start = PATH_BUFFER_OFFSET + offset as usize;
    let end = start + length as usize;
    if end > buffer.len() || length % 2 != 0 {
        return Err(LinkError::MalformedReparseBuffer { len: buffer.len() });
    }
    let units: Vec<u16> = buffer[start..end]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

fn utf16_bytes(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

#[inline]
fn read_u16(buffer: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buffer[at], buffer[at + 1]])
}

#[inline]
fn read_u32(buffer: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
}
