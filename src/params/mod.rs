pub mod cell;
pub mod parameter;
pub mod store;

pub use cell::{AtomicF64, ComplexCell};
pub use parameter::{Parameter, ValueKind};
pub use store::{Observer, ParameterSnapshot, ParameterStore};
