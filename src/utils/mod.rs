pub mod errors;
pub mod util;
