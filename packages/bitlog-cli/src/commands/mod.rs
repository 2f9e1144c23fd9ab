pub mod info;
pub mod record;
pub mod schema;
