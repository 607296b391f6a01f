//! Job admission: input validation, byte staging, queue hand-off and placeholder rows

mod controller;
mod staging;

pub use controller::{has_pdf_suffix, Admission, AdmissionController};
pub use staging::StagingArea;
