mod directory;
mod resolver;

pub use directory::{HttpDirectory, IdentityDirectory};
pub use resolver::IdentityResolver;
