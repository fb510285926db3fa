pub mod form;

pub use form::{clip_keys, compose, summary, Composition, FormComposer};
