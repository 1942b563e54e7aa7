pub mod db;

pub use db::RecordStore;
