/*! Graphs contain blocks connected by streams, and run them.
 */
use std::time::{Duration, Instant};

use log::debug;

use crate::block::{Block, BlockRet};
use crate::Error;

/**
A graph is a thing that runs a set of blocks, wired together by streams
created when the blocks themselves were constructed (each block's
constructor takes the `ReadStream`s it reads from, and exposes an `.out()`
method returning the `ReadStream`(s) it produces).

# Example

```ignore
let mut g = Graph::new();
g.add(Box::new(src));
g.add(Box::new(encoder));
g.add(Box::new(modulator));
g.run()?;
```
*/
pub struct Graph {
    blocks: Vec<Box<dyn Block>>,
}

impl Graph {
    /// Create new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Add a block to the graph.
    ///
    /// Blocks are run in the order they were added on every scheduling pass,
    /// so adding sources before sinks means data tends to flow through in a
    /// single pass rather than needing an extra one.
    pub fn add(&mut self, b: Box<dyn Block>) {
        self.blocks.push(b);
    }

    /// Run the graph until every block reports `EOF` or `Noop` in the same
    /// pass, meaning nothing can make further progress.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            let st_loop = Instant::now();
            let mut all_settled = true;
            let mut any_progress = false;
            for b in &mut self.blocks {
                let st = Instant::now();
                let ret = b.work()?;
                debug!(
                    "work() for {} returned {:?}. Took {:?}",
                    b.block_name(),
                    ret,
                    st.elapsed()
                );
                match ret {
                    BlockRet::Ok => any_progress = true,
                    BlockRet::Pending => all_settled = false,
                    BlockRet::Noop | BlockRet::EOF => {}
                }
            }
            debug!(
                "Graph loop end. settled: {all_settled}, progress: {any_progress}. Took {:?}",
                st_loop.elapsed()
            );
            if all_settled && !any_progress {
                return Ok(());
            }
            if !any_progress {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
