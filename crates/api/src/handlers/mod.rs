pub mod compute;
pub mod matrix;
pub mod probes;
