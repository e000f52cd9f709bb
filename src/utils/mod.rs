pub mod db_utils;
pub mod tag_cache;
pub mod time;
