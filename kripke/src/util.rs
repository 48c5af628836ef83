pub mod cli_utils;
pub mod traits;
