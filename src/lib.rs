pub mod bacnet;
pub mod mango;
pub mod sanitize;
pub mod scan;
pub mod udmi;
pub mod workbook;
