/*!

Types/type aliases that abstract over the implementing backing type.

Interned strings, bit sets used as visited sets, and the logging front end all live here so that the rest of the
crate refers to a single chosen implementation.

*/

mod string_join;

// Logging
pub mod log;

// Interned string.
pub use string_cache::DefaultAtom as IString;

// A set of natural numbers, used for visited sets during traversal.
pub use bit_set::BitSet;

// Join sequences with a separator
pub use string_join::{join_iter, join_string};
