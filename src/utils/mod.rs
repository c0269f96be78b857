pub mod parser;
pub mod parser_registry;
pub mod property_field;
