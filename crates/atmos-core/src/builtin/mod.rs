//! Built-in component providers: terraform, helmfile, and
//! packer, each a thin dispatch-only wrapper shelling out to its own CLI
//! via `atmos-process` — reimplementing any of these tools is explicitly
//! out of scope (non-goals).

pub mod helmfile;
pub mod packer;
pub mod shared;
pub mod terraform;
