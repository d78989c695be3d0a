pub mod columns;
pub mod core;
pub mod marking;
pub mod setup;
pub mod workbook;
