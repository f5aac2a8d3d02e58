pub mod log_view;
