pub mod align_titles;
pub mod cache_status;
pub mod reconcile;
