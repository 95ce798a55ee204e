//! # Router Module
//!
//! The path-matching primitive behind the route registry: given a method and a
//! request path it finds the registered target and extracts path parameters.
//!
//! ## Architecture
//!
//! Routes live in a radix tree keyed by path segment. Parameter segments may be
//! written `{id}` or `:id`.
//!
//! ```rust
//! use jsonroutes::router::Router;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.insert(Method::GET, "/api/pets/{id}", "get_pet");
//!
//! let m = router.route(&Method::GET, "/api/pets/42").unwrap();
//! assert_eq!(m.target, "get_pet");
//! assert_eq!(m.path_params[0].1, "42");
//! ```
//!
//! ## Matching rules
//!
//! - Static segments are preferred over parameter segments (most specific wins)
//! - Empty segments are ignored, so `/items/` matches `/items`
//! - Registering the same method and pattern again replaces the earlier target

mod core;
mod radix;

pub use core::{ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS};
pub use radix::RadixRouter;
