pub mod logger;
pub mod thermal;
