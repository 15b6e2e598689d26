mod analysis;
mod quota;

pub use analysis::*;
pub use quota::*;
