/*! Block implementation.

Blocks are the main building blocks of this crate. They each do one thing,
and you connect them together with streams to process the data.
*/

use crate::Error;

/** Return type for all blocks.

This lets the scheduler know if more data could come out of this block, or
if it should just never bother calling it again.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRet {
    /// At least one sample/frame was produced.
    Ok,

    /// Block didn't produce anything this time, but has a background
    /// process that may suddenly produce (e.g. a demodulator still
    /// acquiring timing lock).
    Pending,

    /// Produced nothing, because not enough input.
    ///
    /// When all nodes in a graph produce either `EOF` or `Noop`, the graph
    /// is considered done, and `Graph::run()` returns.
    Noop,

    /// Block indicates that it will never produce more output.
    ///
    /// Examples: a frame source with no more frames; a demodulator whose
    /// upstream sample source has closed and drained.
    EOF,
}

/// Name of block, for logging/diagnostics.
pub trait BlockName {
    /// Name of block. Not the name of a particular *instance*, but it may
    /// include the type, e.g. `FrameDecoder`.
    fn block_name(&self) -> &str;
}

/// Block trait, that must be implemented for all blocks.
pub trait Block: BlockName {
    /// Block work function.
    ///
    /// A block implementation keeps track of its own inputs and outputs, so
    /// `work()` takes no arguments.
    fn work(&mut self) -> Result<BlockRet, Error>;
}
/* vim: textwidth=80
 */
