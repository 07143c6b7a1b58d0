pub mod api;
mod runtime;
