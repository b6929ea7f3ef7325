//! The quire command line tool as a library.
//!
//! A document is compiled by running it through a [`pipeline::Pipeline`] of
//! [`pipeline::Stage`]s, assembled for the requested output format by
//! [`render::Job`].
pub mod cli;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod stage;
