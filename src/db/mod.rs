/// Database access layer
///
/// Repositories are free async functions over `&PgPool`:
/// - `task_repo`: the deferred-work refresh queue
/// - `catalog_repo`: read/update access to the catalog tables
pub mod catalog_repo;
pub mod task_repo;
