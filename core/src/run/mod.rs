pub mod id;
pub mod workspace;

pub use id::{run_id_ulid, sha256_hex};
pub use workspace::{backup_file_name, RunWorkspace};
