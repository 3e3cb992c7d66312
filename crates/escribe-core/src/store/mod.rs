//! Projects, sections and the hosted table store they live in.

mod client;
mod export;
mod model;

pub use client::{Session, StoreClient, User};
pub use export::{export_file_name, export_project, export_section, ExportFormat};
pub use model::{Profile, Project, Section, MIN_USERNAME_LEN};
