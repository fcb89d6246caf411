pub mod dispatcher;
pub mod generator;
pub mod poller;
pub mod registry;
pub mod target;

pub use dispatcher::{DispatchError, DispatchJob, DispatchOutcome, Dispatcher};
pub use generator::{CommandGenerator, ReportGenerator};
pub use poller::{exists, probe};
pub use registry::{RegistryError, ReportDescriptor, ReportOption, ReportRegistry};
pub use target::ReportTarget;
