pub mod per_read;
pub mod staged;
pub mod stat_txt;
pub mod zip;
