pub mod evaluate;
pub mod train;
pub mod util;
