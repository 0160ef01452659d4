// Document extraction: everything the engine derives from raw text.
// Pure and synchronous: no I/O beyond the taxonomy file read at load/reload.

pub mod domain;
pub mod seniority;
pub mod skills;
pub mod taxonomy;

#[cfg(test)]
pub mod fixtures;
