use crate::record::{Record, Stream};
use crate::store::{Snapshot, StreamStores};

/// Read-only access to stream contents
#[derive(Clone)]
pub struct QueryService {
    stores: StreamStores,
}

impl QueryService {
    pub fn new(stores: StreamStores) -> Self {
        Self { stores }
    }

    /// Current contents of a stream. Empty streams yield an empty log or
    /// `Latest(None)`, never an error.
    pub fn query(&self, stream: Stream) -> Snapshot {
        self.stores.get(stream).snapshot()
    }

    /// Most recent record of a stream, whatever the retention mode
    pub fn latest(&self, stream: Stream) -> Option<Record> {
        self.stores.get(stream).latest()
    }
}
