//! Frame-level constants: symbol rate, frame geometry, and syncwords.

/// Symbol rate in symbols per second.
pub const SYMBOL_RATE: u32 = 4800;

/// Number of 4-FSK symbols in a full frame, including its syncword.
pub const FRAME_SYMBOLS: usize = 192;

/// Number of 4-FSK symbols in a syncword.
pub const SYNCWORD_SYMBOLS: usize = 8;

/// Size of a frame's payload in bytes (`FRAME_SYMBOLS / 4`).
pub const FRAME_BYTES: usize = FRAME_SYMBOLS / 4;

/// Size of a syncword in bytes.
pub const SYNCWORD_BYTES: usize = 2;

/// LSF frame syncword.
pub const SYNC_LSF: [u8; SYNCWORD_BYTES] = [0x55, 0xF7];

/// BERT (test pattern) frame syncword.
pub const SYNC_BERT: [u8; SYNCWORD_BYTES] = [0xDF, 0x55];

/// Stream data frame syncword.
pub const SYNC_STREAM: [u8; SYNCWORD_BYTES] = [0xFF, 0x5D];

/// Packet data frame syncword.
pub const SYNC_PACKET: [u8; SYNCWORD_BYTES] = [0x75, 0xFF];

/// End-of-transmission frame syncword.
pub const SYNC_EOT: [u8; SYNCWORD_BYTES] = [0x55, 0x5D];

/// All known syncwords, for correlation/timing-recovery search.
pub const ALL_SYNCWORDS: [[u8; SYNCWORD_BYTES]; 5] =
    [SYNC_LSF, SYNC_BERT, SYNC_STREAM, SYNC_PACKET, SYNC_EOT];
