pub mod ast;
pub mod error;
pub mod token;
pub mod validation;

pub use ast::*;
pub use error::*;
pub use token::*;
pub use validation::*;
