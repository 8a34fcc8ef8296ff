use super::CacheError;

/// Capability to produce a serialized snapshot of cache state
///
/// The bytes are opaque to everything except the matching [`Unmarshaler`].
/// A blob produced from state `S` must be fully consumable by `unmarshal` to
/// rebuild state equivalent to `S`.
pub trait Marshaler: Send + Sync {
    fn marshal(&self) -> Result<Vec<u8>, CacheError>;
}

/// Capability to replace cache state from a serialized snapshot
///
/// Implementations decide whether a failed `unmarshal` leaves the previous
/// state untouched. Callers must not assume either outcome unless the
/// implementation documents it.
pub trait Unmarshaler: Send {
    fn unmarshal(&mut self, data: &[u8]) -> Result<(), CacheError>;
}
