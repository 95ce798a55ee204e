//! Radix tree implementation for efficient HTTP route matching
//!
//! Paths are split into segments and stored in a tree where:
//! - Each node represents a path segment
//! - Static segments (e.g., `users`) match exactly
//! - Parameter segments (`{id}` or `:id`) match any single segment
//! - Values are stored at terminal nodes, keyed by HTTP method
//!
//! Static children are tried before parameter children, so `/users/me` wins over
//! `/users/{id}` regardless of registration order. Inserting the same method and
//! pattern twice replaces the earlier value.

use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

use super::core::ParamVec;

/// Return the parameter name if `segment` is `{name}` or `:name`.
pub(crate) fn param_name(segment: &str) -> Option<&str> {
    if segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}') {
        Some(&segment[1..segment.len() - 1])
    } else if segment.len() > 1 && segment.starts_with(':') {
        Some(&segment[1..])
    } else {
        None
    }
}

pub(crate) fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[derive(Clone)]
struct RadixNode<T> {
    /// The path segment this node represents (without leading /)
    segment: Arc<str>,
    /// Parameter name if this node is a parameter segment
    param_name: Option<Arc<str>>,
    /// Values for routes ending at this node, per HTTP method
    routes: HashMap<Method, T>,
    /// Static children
    children: Vec<RadixNode<T>>,
    /// Parameter children. Several are kept so `/users/{id}/posts` and
    /// `/users/{user_id}/comments` each extract their own name.
    param_children: Vec<RadixNode<T>>,
}

impl<T: Clone> RadixNode<T> {
    fn new(segment: &str) -> Self {
        Self {
            segment: Arc::from(segment),
            param_name: None,
            routes: HashMap::new(),
            children: Vec::new(),
            param_children: Vec::new(),
        }
    }

    fn new_param(name: &str) -> Self {
        Self {
            segment: Arc::from(""),
            param_name: Some(Arc::from(name)),
            routes: HashMap::new(),
            children: Vec::new(),
            param_children: Vec::new(),
        }
    }

    /// Insert a value, returning the one it replaced (if any)
    fn insert(&mut self, segments: &[&str], method: Method, value: T) -> Option<T> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.insert(method, value);
        };

        if let Some(name) = param_name(segment) {
            if let Some(child) = self
                .param_children
                .iter_mut()
                .find(|c| c.param_name.as_deref() == Some(name))
            {
                return child.insert(remaining, method, value);
            }
            let mut child = RadixNode::new_param(name);
            let replaced = child.insert(remaining, method, value);
            self.param_children.push(child);
            return replaced;
        }

        if let Some(child) = self
            .children
            .iter_mut()
            .find(|c| c.segment.as_ref() == *segment)
        {
            return child.insert(remaining, method, value);
        }
        let mut child = RadixNode::new(segment);
        let replaced = child.insert(remaining, method, value);
        self.children.push(child);
        replaced
    }

    fn search(&self, segments: &[&str], method: &Method, params: &mut ParamVec) -> Option<T> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.get(method).cloned();
        };

        for child in &self.children {
            if child.segment.as_ref() == *segment {
                if let Some(found) = child.search(remaining, method, params) {
                    return Some(found);
                }
            }
        }

        for child in &self.param_children {
            if let Some(name) = &child.param_name {
                params.push((Arc::clone(name), (*segment).to_string()));
                if let Some(found) = child.search(remaining, method, params) {
                    return Some(found);
                }
                // Backtrack
                params.pop();
            }
        }

        None
    }
}

/// Radix tree-based router for O(k) route matching, k being the number of path segments.
#[derive(Clone)]
pub struct RadixRouter<T> {
    root: RadixNode<T>,
}

impl<T: Clone> Default for RadixRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> RadixRouter<T> {
    pub fn new() -> Self {
        Self {
            root: RadixNode::new(""),
        }
    }

    /// Insert `value` for `method` and `pattern`, returning the replaced value if the
    /// same method and pattern were registered before.
    pub fn insert(&mut self, method: Method, pattern: &str, value: T) -> Option<T> {
        let segments = split_segments(pattern);
        self.root.insert(&segments, method, value)
    }

    /// Match a request path, returning the stored value and extracted parameters.
    pub fn route(&self, method: &Method, path: &str) -> Option<(T, ParamVec)> {
        let segments = split_segments(path);
        let mut params = ParamVec::new();
        let value = self.root.search(&segments, method, &mut params)?;
        Some((value, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(params: &'a ParamVec, name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_radix_router_simple_route() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/health", "health_check");

        let (value, params) = router.route(&Method::GET, "/health").unwrap();
        assert_eq!(value, "health_check");
        assert!(params.is_empty());
    }

    #[test]
    fn test_radix_router_braces_and_colon_params() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/users/{user_id}/posts/:post_id", "get_post");

        let (value, params) = router.route(&Method::GET, "/users/123/posts/456").unwrap();
        assert_eq!(value, "get_post");
        assert_eq!(get(&params, "user_id"), Some("123"));
        assert_eq!(get(&params, "post_id"), Some("456"));
    }

    #[test]
    fn test_radix_router_method_filtering() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/items", "get_items");
        router.insert(Method::POST, "/items", "create_item");

        assert_eq!(router.route(&Method::GET, "/items").unwrap().0, "get_items");
        assert_eq!(router.route(&Method::POST, "/items").unwrap().0, "create_item");
        assert!(router.route(&Method::PUT, "/items").is_none());
    }

    #[test]
    fn test_radix_router_static_beats_param() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/users/{id}", "get_user");
        router.insert(Method::GET, "/users/me", "current_user");

        assert_eq!(router.route(&Method::GET, "/users/me").unwrap().0, "current_user");
        assert_eq!(router.route(&Method::GET, "/users/42").unwrap().0, "get_user");
    }

    #[test]
    fn test_radix_router_backtracks_params() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/users/{user_id}/posts", "get_user_posts");
        router.insert(Method::GET, "/users/{id}/comments", "get_user_comments");

        let (value, params) = router.route(&Method::GET, "/users/456/comments").unwrap();
        assert_eq!(value, "get_user_comments");
        assert_eq!(get(&params, "id"), Some("456"));
        assert_eq!(get(&params, "user_id"), None);
    }

    #[test]
    fn test_radix_router_last_insert_wins() {
        let mut router = RadixRouter::new();
        assert!(router.insert(Method::GET, "/x", "first").is_none());
        assert_eq!(router.insert(Method::GET, "/x", "second"), Some("first"));
        assert_eq!(router.route(&Method::GET, "/x").unwrap().0, "second");
    }

    #[test]
    fn test_radix_router_root_and_trailing_slash() {
        let mut router = RadixRouter::new();
        router.insert(Method::GET, "/", "root");
        router.insert(Method::GET, "/items", "items");

        assert_eq!(router.route(&Method::GET, "/").unwrap().0, "root");
        assert_eq!(router.route(&Method::GET, "/items/").unwrap().0, "items");
        assert!(router.route(&Method::GET, "/nope").is_none());
    }

    #[test]
    fn test_param_name() {
        assert_eq!(param_name("{id}"), Some("id"));
        assert_eq!(param_name(":id"), Some("id"));
        assert_eq!(param_name("{}"), None);
        assert_eq!(param_name(":"), None);
        assert_eq!(param_name("users"), None);
    }
}
