pub mod classification;
pub mod enums;
pub mod lab;
pub mod staging_rule;
pub mod validation;

pub use classification::*;
pub use enums::*;
pub use lab::*;
pub use staging_rule::*;
pub use validation::*;
