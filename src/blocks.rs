//! Convenient mod collecting the M17 blocks for import.
pub use crate::demodulator::Demodulator;
pub use crate::frame_decoder::FrameDecoder;
pub use crate::frame_encoder::FrameEncoder;
pub use crate::modulator::Modulator;
