//! ID generation utilities.

use uuid::Uuid;

/// Generate a new entity ID.
///
/// All entity identifiers are opaque 128-bit values; random v4 keeps them
/// unguessable across producers.
#[must_use]
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}
