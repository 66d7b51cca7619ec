//! Domain model (definitions, results, context, errors, events).

pub mod context;
pub mod definition;
pub mod errors;
pub mod events;
pub mod ids;
pub mod result;
pub mod role;

pub use self::context::{CancellationToken, JobContext, JobDataMap};
pub use self::definition::JobDefinition;
pub use self::errors::{DefinitionError, ExecutorError, InvalidStateError, JobError};
pub use self::events::{DomainEvent, RejectReason};
pub use self::ids::{Run, RunId};
pub use self::result::{ErrorDetail, FailureKind, JobResult, JobStatus};
pub use self::role::Role;
