pub mod mutate;
pub mod status;
pub mod task_ops;
pub mod view;
