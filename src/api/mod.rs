/*!

The public API of the library: abstract syntax to describe rules and nets, the values a net reduces to, and the
engine that runs them.

*/

pub mod ast;
pub mod engine;
pub mod value;

#[cfg(test)]
mod tests;
