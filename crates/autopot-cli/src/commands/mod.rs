pub mod grade;
pub mod select;
pub mod train;
