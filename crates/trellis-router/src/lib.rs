//! Trie-based HTTP router.
//!
//! One tree of path segments per request method. Lookups resolve one
//! segment at a time with a fixed priority — literal children first,
//! then regex captures, then named params, then wildcards — so the most
//! specific registered route always wins. A wildcard that ends its
//! registered path absorbs all remaining path material, slashes
//! included.
//!
//! # Route syntax
//!
//! - `/users/detail` — literal segments
//! - `/users/:id` — named param, bound to the matching segment
//! - `/users/:role((.*)_.*)` — regex capture; the declared keys bind to
//!   the pattern's capture groups
//! - `/files/*` — wildcard; absorbing because it is the final segment

#![forbid(unsafe_code)]

mod r#match;
mod trie;

pub use r#match::RouteMatch;
pub use trie::{Node, RouteError, RouteTree, Router};
