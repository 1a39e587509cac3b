pub mod create_manager;
pub mod initdb;
pub mod migrate_and_serve;
pub mod serve;

pub use create_manager::create_manager;
pub use initdb::init_database;
pub use migrate_and_serve::migrate_and_serve;
pub use serve::serve;
