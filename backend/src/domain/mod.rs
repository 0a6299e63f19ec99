// Domain layer module
pub mod artifact;
pub mod base;
pub mod entities;
pub mod value_objects;

pub use artifact::*;
pub use base::*;
pub use entities::*;
pub use value_objects::*;
