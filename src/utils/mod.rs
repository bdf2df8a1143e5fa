pub mod employee_id_cache;
pub mod employee_id_filter;
