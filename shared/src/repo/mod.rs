pub mod bar_repo;
pub mod execution_repo;
pub mod instance_repo;
pub mod order_repo;
pub mod result_repo;
