pub mod plan;
pub mod raw;
pub mod site;
