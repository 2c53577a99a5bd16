use crate::event::{edge_line, node_line, version_node_line, LinkRecord};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// All mutable per-batch state. Node and edge IDs are only meaningful
/// within one batch; both sequences restart at 1 after every flush.
#[derive(Debug)]
struct BatchState {
    node_counter: u64,
    edge_counter: u64,
    record_count: usize,
    buffer: Vec<String>,
}

impl BatchState {
    fn new() -> Self {
        Self {
            node_counter: 1,
            edge_counter: 1,
            record_count: 0,
            buffer: Vec::new(),
        }
    }

    fn drain(&mut self) -> Vec<String> {
        let lines = std::mem::take(&mut self.buffer);
        *self = Self::new();
        lines
    }
}

/// What the caller should do after a record was folded in: keep feeding the
/// open batch, or dispatch the drained lines of the batch that just closed.
#[derive(Debug)]
pub enum BatchContinuation {
    Open,
    Closed(Vec<String>),
}

pub struct BatchBuilder {
    batch_size: usize,
    state: BatchState,
}

impl BatchBuilder {
    pub fn new(batch_size: usize) -> Self {
        Self {
            // A zero batch size would make every accept drain an empty buffer.
            batch_size: batch_size.max(1),
            state: BatchState::new(),
        }
    }

    /// Fold one LinkRecord into the open batch: the VersionNode first, then
    /// a Node and its Edge per outlink, node always serialized before the
    /// edge that targets it. Closes the batch when `batch_size` records have
    /// been accepted since the last flush.
    pub fn accept(&mut self, record: &LinkRecord) -> BatchContinuation {
        let state = &mut self.state;

        let source_id = state.node_counter;
        state.node_counter += 1;
        state
            .buffer
            .push(version_node_line(source_id, &record.source, &record.timestamp));

        for outlink in &record.outlinks {
            let node_id = state.node_counter;
            state.node_counter += 1;
            state.buffer.push(node_line(node_id, outlink));

            let edge_id = state.edge_counter;
            state.edge_counter += 1;
            state.buffer.push(edge_line(edge_id, source_id, node_id));
        }

        state.record_count += 1;
        if state.record_count >= self.batch_size {
            BatchContinuation::Closed(state.drain())
        } else {
            BatchContinuation::Open
        }
    }

    /// Drain whatever is left for the final flush at end of run.
    pub fn finish(&mut self) -> Vec<String> {
        self.state.drain()
    }

    pub fn record_count(&self) -> usize {
        self.state.record_count
    }
}
