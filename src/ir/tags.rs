//! Identity handles for values and basic blocks.
//!
//! A tag is compared by identity only. Two tags created from the same name are
//! still different tags; the name exists for display and debugging. Tags are
//! globally unique for the life of the process, so a tag created for one graph
//! can never collide with a tag created for another.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TAG_ID: AtomicU64 = AtomicU64::new(1);

fn next_tag_id() -> u64 {
    NEXT_TAG_ID.fetch_add(1, Ordering::Relaxed)
}

macro_rules! define_tag {
    ($(#[$meta:meta])* $name:ident, $sigil:literal) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            id: u64,
            name: Option<Arc<str>>,
        }

        impl $name {
            /// Creates a fresh tag with a display name.
            pub fn new(name: impl Into<Arc<str>>) -> Self {
                let name: Arc<str> = name.into();
                $name {
                    id: next_tag_id(),
                    name: if name.is_empty() { None } else { Some(name) },
                }
            }

            /// Creates a fresh tag without a display name.
            pub fn anonymous() -> Self {
                $name {
                    id: next_tag_id(),
                    name: None,
                }
            }

            /// Creates a fresh tag that carries the same display name as `self`.
            pub fn renamed(&self) -> Self {
                $name {
                    id: next_tag_id(),
                    name: self.name.clone(),
                }
            }

            pub fn name(&self) -> &str {
                self.name.as_deref().unwrap_or("")
            }

            pub fn id(&self) -> u64 {
                self.id
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        // Creation order, so maps keyed by tags iterate deterministically
        impl Ord for $name {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.id.cmp(&other.id)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                $name::new(name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match &self.name {
                    Some(name) => write!(f, concat!($sigil, "{}.{}"), name, self.id),
                    None => write!(f, concat!($sigil, "{}"), self.id),
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }
    };
}

define_tag!(
    /// Names a single definition: either a block parameter or an instruction.
    ValueTag,
    "%"
);

define_tag!(
    /// Names a basic block.
    BasicBlockTag,
    "@"
);
