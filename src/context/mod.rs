/// Publish/notify bus over context records
pub mod context_bus;

pub mod context_record;
