pub mod descriptor;
pub mod inject;
pub mod provider;
pub mod registry;
pub mod scope;

pub use descriptor::{short_type_name, Instance, ProviderId};
pub use inject::{Binding, Dependency, Inject, Injector, Resolvable};
pub use provider::ProviderDecl;
pub use registry::{resolve_memoized, MemoSlot, Memoized, ProviderRegistry};
pub use scope::{GlobalScope, LocalEntry, LocalScope, Tier};
