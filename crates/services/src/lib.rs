#![forbid(unsafe_code)]

pub mod app_services;
pub mod certificate;
pub mod course_service;
pub mod error;
pub mod generation;
mod snapshot_writer;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use certificate::{Certificate, certificate_file_name, render_certificate};
pub use course_service::{CourseService, LessonLoad};
pub use error::{AppServicesError, CertificateError, CourseError, GenerationError};
pub use generation::{ChatContentGenerator, ContentGenerator};
