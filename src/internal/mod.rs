//! Internal implementation details.

mod dispose;

pub(crate) use dispose::{dispose_all_reverse, Disposer};
