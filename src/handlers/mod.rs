pub mod extractors;
pub mod health;
pub mod records;

pub use extractors::JsonBody;
pub use health::*;
pub use records::*;
