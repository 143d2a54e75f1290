//! Domain types for the archive API.

pub mod archive;
pub mod user;

pub use archive::{ArchiveDescriptor, StationEntry, StationFile, StationQueryResult};
pub use user::{RegistrationForm, UserProfile};
