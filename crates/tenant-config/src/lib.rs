pub mod loader;
pub mod store;

pub use loader::{AssembledTenantConfig, TenantConfigLoader, FINALIZE_TOOL_NAME};
pub use store::{
    FileTenantPromptStore, NullReservationFieldStore, NullTenantPromptStore,
    ReservationFieldStore, TenantPrompt, TenantPromptStore,
};
