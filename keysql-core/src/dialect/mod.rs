/// Dialect helpers shared by the statement layer
///
/// The WITH-clause option parser and the token-level inspection of
/// executable statements.

pub mod lexer;
pub mod options;

pub use lexer::{count_placeholders, select_columns};
pub use options::WithOptions;
