pub mod document;
pub mod domain;
pub mod model;

pub use document::PolicyDocument;
pub use domain::{Domain, DomainDescriptor, InventoryKind, Selector};
pub use model::{Attributes, DesiredObject, DesiredSet};
