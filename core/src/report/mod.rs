pub mod assemble;
pub mod bytes;
pub mod model;
pub mod render;

pub use assemble::{ReportAssembler, ReportParts, ScanDescriptor};
pub use bytes::human_bytes;
pub use model::{
    ArchiveEntry, Capabilities, Category, Check, Dimensions, ErrorReport, NetworkRequestRecord,
    Report, RuntimeMetrics, ScanMetadata, Status, Thumbnail, ENTRY_URL_TEMPLATE,
};
