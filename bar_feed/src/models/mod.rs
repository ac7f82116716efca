pub mod bar;
pub mod bar_size;
pub mod lookback;
pub mod range;
pub mod request;
pub mod security;
