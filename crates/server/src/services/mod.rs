//! Use-case services behind the handlers

pub mod theses;

pub use theses::ThesisService;
