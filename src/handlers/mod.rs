// HTTP handlers grouped by who may call them.
pub mod elevated;
pub mod protected;
pub mod public;
