use thiserror::Error;

use crate::tick::Tick;

/// Unrecoverable faults raised by a reactor callback. The tick loop halts on
/// any of these; recovery belongs to layers above the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactorFault {
    #[error("synchronization failed in reactor '{reactor}' at tick {tick}")]
    Synchronize { reactor: String, tick: Tick },

    #[error("deliberation failed in reactor '{reactor}' at tick {tick}")]
    Resume { reactor: String, tick: Tick },

    #[error("reactor '{reactor}' panicked during {operation} at tick {tick}")]
    Panicked {
        reactor: String,
        operation: &'static str,
        tick: Tick,
    },
}
