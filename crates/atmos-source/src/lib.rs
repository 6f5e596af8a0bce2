//! JIT vendoring of component sources: content-addressed
//! fetch/cache with a git-worktree + sparse-checkout strategy for git
//! URLs, a go-getter-style fallback for everything else, and the cache
//! CRUD surface (`list`/`prune`/`clear`/`refresh`) exposed per component
//! type.

mod cache;
mod copy;
mod fallback;
mod git;
mod provisioner;
mod target;

pub use cache::{CacheEntry, DEFAULT_TTL, clear, list, prune, refresh};
pub use copy::copy_tree;
pub use fallback::{FallbackScheme, classify, fetch};
pub use git::GitCache;
pub use provisioner::{ProvisionOptions, ProvisionOutcome, ensure_source};
pub use target::{resolve_target_path, skip_vendoring};
