//! Link Setup Frame (LSF): the 30-byte header that establishes an M17
//! session, plus the LICH (Link Information Channel) segment codec that
//! carries an LSF one sixth at a time inside every stream frame.
//!
//! The LICH split/Golay-encode and reassembly/Golay-decode steps are free
//! functions rather than `Lsf` methods: an `Lsf` type that depended on
//! [`crate::golay`], which depends on bit layout, which depends back on
//! `Lsf`'s own field widths, would be a cyclic type graph for no benefit.

use crate::bits::{get_bit, set_bit};
use crate::callsign::{CALLSIGN_LEN, BROADCAST};
use crate::crc::{check_crc16, crc16};
use crate::golay::{golay24_decode, golay24_encode};
use crate::{Error, Result};

/// Packed wire size of an LSF.
pub const LSF_LEN: usize = 30;

/// Size of the `meta` union field.
pub const META_LEN: usize = 14;

/// Number of LICH segments needed to carry a full LSF (`LSF_LEN / 5`).
pub const LICH_SEGMENTS: usize = 6;

/// Bytes of LSF payload carried per LICH segment.
const LICH_PAYLOAD_LEN: usize = 5;

/// Transmitted (Golay-coded) size of one LICH segment.
pub const LICH_SEGMENT_LEN: usize = 12;

/// `dataMode` field of the LSF `type` bitfield (bit 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// Packet data session.
    Packet,
    /// Stream (voice/data) session.
    Stream,
}

/// `dataType` field of the LSF `type` bitfield (bits 1..2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Reserved / unset.
    Reserved,
    /// Data only.
    Data,
    /// Voice only.
    Voice,
    /// Voice and data.
    VoiceData,
}

/// `encType` field of the LSF `type` bitfield (bits 3..4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionType {
    /// No encryption.
    None,
    /// AES encryption.
    Aes,
    /// Scrambler (weak) encryption.
    Scrambler,
    /// Other / reserved encryption scheme.
    Other,
}

fn data_type_from_bits(v: u8) -> DataType {
    match v & 0b11 {
        0 => DataType::Reserved,
        1 => DataType::Data,
        2 => DataType::Voice,
        _ => DataType::VoiceData,
    }
}

fn enc_type_from_bits(v: u8) -> EncryptionType {
    match v & 0b11 {
        0 => EncryptionType::None,
        1 => EncryptionType::Aes,
        2 => EncryptionType::Scrambler,
        _ => EncryptionType::Other,
    }
}

/// GNSS position record, one of the three shapes the LSF `meta` field may
/// hold. Field widths follow `M17Datatypes.hpp`'s `gnss_t`; multi-byte
/// subfields are packed little-endian (the source leaves this
/// unspecified for a packed struct on a little-endian MCU target, a
/// resolved Open Question recorded in DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GnssData {
    /// Data source identifier.
    pub data_source: u8,
    /// Station type.
    pub station_type: u8,
    /// Sign/validity flag bits.
    pub flags: u8,
    /// Whole-degree latitude.
    pub lat_deg: u8,
    /// Latitude decimal fraction, scaled by 65535.
    pub lat_dec: u16,
    /// Whole-degree longitude.
    pub lon_deg: u8,
    /// Longitude decimal fraction, scaled by 65535.
    pub lon_dec: u16,
    /// Altitude in feet, offset by +1500.
    pub altitude: u16,
    /// Bearing in degrees.
    pub bearing: u16,
    /// Speed in mph.
    pub speed: u8,
}

impl GnssData {
    fn to_bytes(self) -> [u8; META_LEN] {
        let mut out = [0u8; META_LEN];
        out[0] = self.data_source;
        out[1] = self.station_type;
        out[2] = self.flags;
        out[3] = self.lat_deg;
        out[4..6].copy_from_slice(&self.lat_dec.to_le_bytes());
        out[6] = self.lon_deg;
        out[7..9].copy_from_slice(&self.lon_dec.to_le_bytes());
        out[9..11].copy_from_slice(&self.altitude.to_le_bytes());
        out[11..13].copy_from_slice(&self.bearing.to_le_bytes());
        out[13] = self.speed;
        out
    }

    fn from_bytes(b: &[u8; META_LEN]) -> Self {
        Self {
            data_source: b[0],
            station_type: b[1],
            flags: b[2],
            lat_deg: b[3],
            lat_dec: u16::from_le_bytes([b[4], b[5]]),
            lon_deg: b[6],
            lon_dec: u16::from_le_bytes([b[7], b[8]]),
            altitude: u16::from_le_bytes([b[9], b[10]]),
            bearing: u16::from_le_bytes([b[11], b[12]]),
            speed: b[13],
        }
    }
}

/// The `meta` union: 14 bytes interpreted one of three ways. The LSF
/// itself doesn't carry a tag saying which; callers interpret it
/// according to the session's `dataType`/`encType`, matching the plain C
/// union in `M17Datatypes.hpp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meta {
    /// Opaque bytes.
    Raw([u8; META_LEN]),
    /// A pair of extended callsigns (reflector group calls, relay chains).
    ExtendedCallsign {
        /// First extended callsign.
        call1: [u8; CALLSIGN_LEN],
        /// Second extended callsign.
        call2: [u8; CALLSIGN_LEN],
    },
    /// GNSS position record.
    Gnss(GnssData),
}

impl Default for Meta {
    fn default() -> Self {
        Meta::Raw([0u8; META_LEN])
    }
}

impl Meta {
    fn to_bytes(self) -> [u8; META_LEN] {
        match self {
            Meta::Raw(b) => b,
            Meta::ExtendedCallsign { call1, call2 } => {
                let mut out = [0u8; META_LEN];
                out[0..6].copy_from_slice(&call1);
                out[6..12].copy_from_slice(&call2);
                out
            }
            Meta::Gnss(g) => g.to_bytes(),
        }
    }

    /// Reinterpret the raw bytes as an extended-callsign pair.
    #[must_use]
    pub fn as_extended_callsign(&self) -> ([u8; CALLSIGN_LEN], [u8; CALLSIGN_LEN]) {
        let b = self.to_bytes();
        let mut call1 = [0u8; CALLSIGN_LEN];
        let mut call2 = [0u8; CALLSIGN_LEN];
        call1.copy_from_slice(&b[0..6]);
        call2.copy_from_slice(&b[6..12]);
        (call1, call2)
    }

    /// Reinterpret the raw bytes as a GNSS record.
    #[must_use]
    pub fn as_gnss(&self) -> GnssData {
        GnssData::from_bytes(&self.to_bytes())
    }
}

/// Link Setup Frame: `{dst[6], src[6], type[2], meta[14], crc[2]}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lsf {
    dst: [u8; CALLSIGN_LEN],
    src: [u8; CALLSIGN_LEN],
    type_field: u16,
    meta: Meta,
}

impl Lsf {
    /// New LSF with the given destination/source callsign bytes (already
    /// base-40 encoded via [`crate::callsign::encode_callsign`]), `type`
    /// field zero, and empty meta. CRC is not yet valid; call
    /// [`Lsf::update_crc`] before transmitting.
    pub fn new(dst: [u8; CALLSIGN_LEN], src: [u8; CALLSIGN_LEN]) -> Result<Self> {
        if src == BROADCAST {
            return Err(Error::SourceCallsignBroadcast);
        }
        Ok(Self { dst, src, type_field: 0, meta: Meta::default() })
    }

    /// Destination callsign bytes.
    #[must_use]
    pub fn destination(&self) -> [u8; CALLSIGN_LEN] {
        self.dst
    }

    /// Set the destination callsign bytes. Broadcast is a valid
    /// destination.
    pub fn set_destination(&mut self, dst: [u8; CALLSIGN_LEN]) {
        self.dst = dst;
    }

    /// Source callsign bytes.
    #[must_use]
    pub fn source(&self) -> [u8; CALLSIGN_LEN] {
        self.src
    }

    /// Set the source callsign bytes. Rejects the broadcast pattern: a
    /// source is never `"ALL"`.
    pub fn set_source(&mut self, src: [u8; CALLSIGN_LEN]) -> Result<()> {
        if src == BROADCAST {
            return Err(Error::SourceCallsignBroadcast);
        }
        self.src = src;
        Ok(())
    }

    /// Raw 16-bit `type` bitfield, as transmitted (big-endian on wire).
    #[must_use]
    pub fn type_raw(&self) -> u16 {
        self.type_field
    }

    /// Set the raw 16-bit `type` bitfield directly.
    pub fn set_type_raw(&mut self, value: u16) {
        self.type_field = value;
    }

    /// `dataMode` subfield (bit 0).
    #[must_use]
    pub fn data_mode(&self) -> DataMode {
        if self.type_field & 1 == 1 {
            DataMode::Stream
        } else {
            DataMode::Packet
        }
    }

    /// Set `dataMode` (bit 0).
    pub fn set_data_mode(&mut self, mode: DataMode) {
        let bit = matches!(mode, DataMode::Stream) as u16;
        self.type_field = (self.type_field & !1) | bit;
    }

    /// `dataType` subfield (bits 1..2).
    #[must_use]
    pub fn data_type(&self) -> DataType {
        data_type_from_bits(((self.type_field >> 1) & 0b11) as u8)
    }

    /// Set `dataType` (bits 1..2).
    pub fn set_data_type(&mut self, dt: DataType) {
        let v = dt as u16;
        self.type_field = (self.type_field & !(0b11 << 1)) | (v << 1);
    }

    /// `encType` subfield (bits 3..4).
    #[must_use]
    pub fn encryption_type(&self) -> EncryptionType {
        enc_type_from_bits(((self.type_field >> 3) & 0b11) as u8)
    }

    /// Set `encType` (bits 3..4).
    pub fn set_encryption_type(&mut self, et: EncryptionType) {
        let v = et as u16;
        self.type_field = (self.type_field & !(0b11 << 3)) | (v << 3);
    }

    /// `encSubType` subfield (bits 5..6).
    #[must_use]
    pub fn enc_sub_type(&self) -> u8 {
        ((self.type_field >> 5) & 0b11) as u8
    }

    /// Set `encSubType` (bits 5..6, only the low 2 bits of `v` are used).
    pub fn set_enc_sub_type(&mut self, v: u8) {
        let v = u16::from(v & 0b11);
        self.type_field = (self.type_field & !(0b11 << 5)) | (v << 5);
    }

    /// `CAN` (Channel Access Number) subfield (bits 7..10).
    #[must_use]
    pub fn can(&self) -> u8 {
        ((self.type_field >> 7) & 0b1111) as u8
    }

    /// Set `CAN` (bits 7..10, only the low 4 bits of `v` are used).
    pub fn set_can(&mut self, v: u8) {
        let v = u16::from(v & 0b1111);
        self.type_field = (self.type_field & !(0b1111 << 7)) | (v << 7);
    }

    /// Current `meta` contents.
    #[must_use]
    pub fn meta(&self) -> Meta {
        self.meta
    }

    /// Set the `meta` field (overload for any of the three shapes).
    pub fn set_meta(&mut self, meta: Meta) {
        self.meta = meta;
    }

    /// Pack the LSF into its 30-byte wire form, `crc` taken from whatever
    /// was last computed by [`Lsf::update_crc`] (zero if never called).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; LSF_LEN] {
        let mut out = [0u8; LSF_LEN];
        out[0..6].copy_from_slice(&self.dst);
        out[6..12].copy_from_slice(&self.src);
        out[12..14].copy_from_slice(&self.type_field.to_be_bytes());
        out[14..28].copy_from_slice(&self.meta.to_bytes());
        let crc = crc16(&out[0..28]);
        out[28..30].copy_from_slice(&crc.to_be_bytes());
        out
    }

    /// Recompute and store the trailing CRC-16. Since the CRC is always
    /// derived from the other 28 bytes rather than cached, this is a
    /// no-op kept for API symmetry with the original `updateCrc()`
    /// contract; [`Lsf::to_bytes`] and [`Lsf::valid`] both recompute it
    /// fresh.
    pub fn update_crc(&mut self) {}

    /// True if the LSF's fields, packed to wire bytes, produce a
    /// self-consistent CRC. Since this type always derives its own CRC on
    /// `to_bytes`, this only returns `false` for an LSF parsed from bytes
    /// whose CRC didn't match (see [`Lsf::from_bytes`]).
    #[must_use]
    pub fn valid(&self) -> bool {
        let bytes = self.to_bytes();
        check_crc16(&bytes)
    }

    /// Parse a 30-byte wire-format LSF, checking its CRC.
    pub fn from_bytes(bytes: &[u8; LSF_LEN]) -> Result<Self> {
        if !check_crc16(bytes) {
            return Err(Error::CrcMismatch);
        }
        let mut dst = [0u8; CALLSIGN_LEN];
        let mut src = [0u8; CALLSIGN_LEN];
        dst.copy_from_slice(&bytes[0..6]);
        src.copy_from_slice(&bytes[6..12]);
        let type_field = u16::from_be_bytes([bytes[12], bytes[13]]);
        let mut meta_bytes = [0u8; META_LEN];
        meta_bytes.copy_from_slice(&bytes[14..28]);
        Ok(Self { dst, src, type_field, meta: Meta::Raw(meta_bytes) })
    }

    /// Parse a 30-byte wire-format LSF without checking its CRC, e.g. for
    /// an LSF reassembled from LICH segments whose own Golay decode
    /// already vouches for the bits (the caller checks CRC separately).
    #[must_use]
    pub fn from_bytes_unchecked(bytes: &[u8; LSF_LEN]) -> Self {
        let mut dst = [0u8; CALLSIGN_LEN];
        let mut src = [0u8; CALLSIGN_LEN];
        dst.copy_from_slice(&bytes[0..6]);
        src.copy_from_slice(&bytes[6..12]);
        let type_field = u16::from_be_bytes([bytes[12], bytes[13]]);
        let mut meta_bytes = [0u8; META_LEN];
        meta_bytes.copy_from_slice(&bytes[14..28]);
        Self { dst, src, type_field, meta: Meta::Raw(meta_bytes) }
    }
}

fn chunk_to_words(chunk: &[u8; LICH_PAYLOAD_LEN + 1]) -> [u16; 4] {
    let mut words = [0u16; 4];
    for (w, word) in words.iter_mut().enumerate() {
        let mut val = 0u16;
        for b in 0..12 {
            val = (val << 1) | u16::from(get_bit(chunk, w * 12 + b));
        }
        *word = val;
    }
    words
}

fn words_to_chunk(words: &[u16; 4]) -> [u8; LICH_PAYLOAD_LEN + 1] {
    let mut chunk = [0u8; LICH_PAYLOAD_LEN + 1];
    for (w, &word) in words.iter().enumerate() {
        for b in 0..12 {
            let bit = (word >> (11 - b)) & 1 == 1;
            set_bit(&mut chunk, w * 12 + b, bit);
        }
    }
    chunk
}

/// Split LSF segment `idx` (0..6) out of `lsf`, tag it with the segment
/// number, and Golay(24,12)-encode it into a 12-byte transmitted LICH
/// segment.
///
/// # Panics
/// Panics if `idx >= `[`LICH_SEGMENTS`].
#[must_use]
pub fn lsf_to_lich_segment(lsf: &Lsf, idx: u8) -> [u8; LICH_SEGMENT_LEN] {
    assert!((idx as usize) < LICH_SEGMENTS, "LICH segment index out of range: {idx}");
    let bytes = lsf.to_bytes();
    let start = idx as usize * LICH_PAYLOAD_LEN;
    let mut chunk = [0u8; LICH_PAYLOAD_LEN + 1];
    chunk[..LICH_PAYLOAD_LEN].copy_from_slice(&bytes[start..start + LICH_PAYLOAD_LEN]);
    chunk[LICH_PAYLOAD_LEN] = idx << 5;

    let words = chunk_to_words(&chunk);
    let mut out = [0u8; LICH_SEGMENT_LEN];
    for (w, &word) in words.iter().enumerate() {
        let cw = golay24_encode(word);
        out[w * 3] = (cw >> 16) as u8;
        out[w * 3 + 1] = (cw >> 8) as u8;
        out[w * 3 + 2] = cw as u8;
    }
    out
}

/// Golay-decode a 12-byte transmitted LICH segment back into its 5-byte
/// LSF payload chunk, segment number, and total corrected bit errors
/// across its four codewords.
pub fn lich_segment_to_chunk(
    segment: &[u8; LICH_SEGMENT_LEN],
) -> Result<([u8; LICH_PAYLOAD_LEN], u8, u32)> {
    let mut words = [0u16; 4];
    let mut total_errors = 0u32;
    for (w, word) in words.iter_mut().enumerate() {
        let cw = (u32::from(segment[w * 3]) << 16)
            | (u32::from(segment[w * 3 + 1]) << 8)
            | u32::from(segment[w * 3 + 2]);
        let (data, errs) = golay24_decode(cw)?;
        *word = data;
        total_errors += errs;
    }
    let chunk = words_to_chunk(&words);
    let mut payload = [0u8; LICH_PAYLOAD_LEN];
    payload.copy_from_slice(&chunk[..LICH_PAYLOAD_LEN]);
    let idx = chunk[LICH_PAYLOAD_LEN] >> 5;
    Ok((payload, idx, total_errors))
}

/// Accumulates LICH segments across consecutive stream frames, promoting
/// a fully reassembled, CRC-valid [`Lsf`] once all six segments (any
/// order, any starting offset) have arrived.
#[derive(Debug, Clone, Default)]
pub struct LichReassembler {
    have: [bool; LICH_SEGMENTS],
    bytes: [u8; LSF_LEN],
}

impl LichReassembler {
    /// New, empty reassembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all accumulated segments.
    pub fn reset(&mut self) {
        self.have = [false; LICH_SEGMENTS];
    }

    /// Feed one decoded LICH segment. Returns the reassembled LSF once
    /// all six segments have arrived and its CRC checks out; returns
    /// `None` while segments are still missing. A segment with a bad CRC
    /// once complete just keeps waiting for a corrected re-send of the
    /// whole cycle (the caller typically calls [`LichReassembler::reset`]
    /// on a segment-0 boundary instead).
    pub fn feed(&mut self, payload: &[u8; LICH_PAYLOAD_LEN], idx: u8) -> Option<Lsf> {
        if idx as usize >= LICH_SEGMENTS {
            return None;
        }
        let start = idx as usize * LICH_PAYLOAD_LEN;
        self.bytes[start..start + LICH_PAYLOAD_LEN].copy_from_slice(payload);
        self.have[idx as usize] = true;
        if !self.have.iter().all(|&h| h) {
            return None;
        }
        Lsf::from_bytes(&self.bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsign::encode_callsign;

    #[test]
    fn rejects_broadcast_source() {
        let dst = encode_callsign("ALL").unwrap();
        let src = encode_callsign("ALL").unwrap();
        assert!(matches!(Lsf::new(dst, src), Err(Error::SourceCallsignBroadcast)));
    }

    #[test]
    fn type_bitfield_roundtrip() {
        let dst = encode_callsign("ALL").unwrap();
        let src = encode_callsign("N0CALL").unwrap();
        let mut lsf = Lsf::new(dst, src).unwrap();
        lsf.set_data_mode(DataMode::Stream);
        lsf.set_data_type(DataType::Voice);
        lsf.set_encryption_type(EncryptionType::Aes);
        lsf.set_enc_sub_type(0b10);
        lsf.set_can(0b1011);

        assert_eq!(lsf.data_mode(), DataMode::Stream);
        assert_eq!(lsf.data_type(), DataType::Voice);
        assert_eq!(lsf.encryption_type(), EncryptionType::Aes);
        assert_eq!(lsf.enc_sub_type(), 0b10);
        assert_eq!(lsf.can(), 0b1011);
    }

    #[test]
    fn to_bytes_from_bytes_roundtrip() {
        let dst = encode_callsign("ALL").unwrap();
        let src = encode_callsign("N0CALL").unwrap();
        let mut lsf = Lsf::new(dst, src).unwrap();
        lsf.set_data_mode(DataMode::Stream);
        lsf.set_can(5);
        let bytes = lsf.to_bytes();
        let parsed = Lsf::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.destination(), dst);
        assert_eq!(parsed.source(), src);
        assert_eq!(parsed.can(), 5);
        assert!(parsed.valid());
    }

    #[test]
    fn from_bytes_rejects_bad_crc() {
        let dst = encode_callsign("ALL").unwrap();
        let src = encode_callsign("N0CALL").unwrap();
        let lsf = Lsf::new(dst, src).unwrap();
        let mut bytes = lsf.to_bytes();
        bytes[0] ^= 0xFF;
        assert!(matches!(Lsf::from_bytes(&bytes), Err(Error::CrcMismatch)));
    }

    #[test]
    fn extended_callsign_meta_roundtrip() {
        let call1 = encode_callsign("N0CALL").unwrap();
        let call2 = encode_callsign("N1CALL").unwrap();
        let mut lsf =
            Lsf::new(encode_callsign("ALL").unwrap(), encode_callsign("N0CALL").unwrap()).unwrap();
        lsf.set_meta(Meta::ExtendedCallsign { call1, call2 });
        let (c1, c2) = lsf.meta().as_extended_callsign();
        assert_eq!(c1, call1);
        assert_eq!(c2, call2);
    }

    #[test]
    fn gnss_meta_roundtrip() {
        let gnss = GnssData {
            data_source: 1,
            station_type: 2,
            flags: 0b0000_0011,
            lat_deg: 37,
            lat_dec: 12345,
            lon_deg: 122,
            lon_dec: 54321,
            altitude: 1500 + 250,
            bearing: 270,
            speed: 15,
        };
        let mut lsf =
            Lsf::new(encode_callsign("ALL").unwrap(), encode_callsign("N0CALL").unwrap()).unwrap();
        lsf.set_meta(Meta::Gnss(gnss));
        assert_eq!(lsf.meta().as_gnss(), gnss);
    }

    #[test]
    fn lich_segment_roundtrip_all_indices() {
        let dst = encode_callsign("ALL").unwrap();
        let src = encode_callsign("N0CALL").unwrap();
        let mut lsf = Lsf::new(dst, src).unwrap();
        lsf.set_can(9);
        let bytes = lsf.to_bytes();

        for idx in 0..LICH_SEGMENTS as u8 {
            let segment = lsf_to_lich_segment(&lsf, idx);
            let (payload, got_idx, errors) = lich_segment_to_chunk(&segment).unwrap();
            assert_eq!(got_idx, idx);
            assert_eq!(errors, 0);
            let start = idx as usize * LICH_PAYLOAD_LEN;
            assert_eq!(&payload[..], &bytes[start..start + LICH_PAYLOAD_LEN]);
        }
    }

    #[test]
    fn lich_reassembly_recovers_lsf_out_of_order() {
        let dst = encode_callsign("N2CALL").unwrap();
        let src = encode_callsign("N0CALL").unwrap();
        let mut lsf = Lsf::new(dst, src).unwrap();
        lsf.set_data_mode(DataMode::Stream);
        lsf.set_can(3);

        let mut reassembler = LichReassembler::new();
        let order = [3u8, 0, 5, 1, 4, 2];
        let mut result = None;
        for &idx in &order {
            let segment = lsf_to_lich_segment(&lsf, idx);
            let (payload, got_idx, _) = lich_segment_to_chunk(&segment).unwrap();
            result = reassembler.feed(&payload, got_idx);
        }
        let reassembled = result.expect("all six segments fed");
        assert_eq!(reassembled.destination(), dst);
        assert_eq!(reassembled.source(), src);
        assert_eq!(reassembled.can(), 3);
    }

    #[test]
    fn lich_segment_corrects_bit_error() {
        let dst = encode_callsign("ALL").unwrap();
        let src = encode_callsign("N0CALL").unwrap();
        let lsf = Lsf::new(dst, src).unwrap();
        let mut segment = lsf_to_lich_segment(&lsf, 2);
        segment[0] ^= 0x01;
        let (_, got_idx, errors) = lich_segment_to_chunk(&segment).unwrap();
        assert_eq!(got_idx, 2);
        assert!(errors >= 1);
    }
}
