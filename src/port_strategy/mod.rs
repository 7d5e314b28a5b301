//! Provides a means to hold configuration options specifically for port scanning.
mod range_iterator;
use crate::input::{PortRange, ScanOrder};
pub use range_iterator::RangeIterator;

/// The order in which ports are handed to the probes.
///
/// The order only affects when a port is probed, never what ends up in the
/// report: the scanner sorts its results by port number once every probe has
/// finished.
#[derive(Debug, Clone, Copy)]
pub enum PortStrategy {
    Serial(PortRange),
    Random(PortRange),
}

impl PortStrategy {
    pub fn pick(range: PortRange, order: ScanOrder) -> Self {
        match order {
            ScanOrder::Serial => PortStrategy::Serial(range),
            ScanOrder::Random => PortStrategy::Random(range),
        }
    }

    pub fn range(&self) -> PortRange {
        match self {
            PortStrategy::Serial(range) | PortStrategy::Random(range) => *range,
        }
    }

    /// Every port of the range exactly once, in strategy order.
    pub fn ordered_iter(&self) -> RangeIterator {
        match self {
            PortStrategy::Serial(range) => RangeIterator::new_serial(*range),
            PortStrategy::Random(range) => RangeIterator::new_random(*range),
        }
    }
}
