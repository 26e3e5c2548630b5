//! Route matching result.

use std::collections::HashMap;

use trellis_core::Handler;

use crate::trie::Node;

/// A resolved route: the matched node plus the params bound during the
/// walk.
///
/// The node may be an interior vertex with no bound handler; callers
/// must check [`RouteMatch::handler`] before dispatching.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    node: &'a Node,
    params: HashMap<String, String>,
}

impl<'a> RouteMatch<'a> {
    pub(crate) fn new(node: &'a Node, params: HashMap<String, String>) -> Self {
        Self { node, params }
    }

    /// The matched trie node.
    #[must_use]
    pub fn node(&self) -> &'a Node {
        self.node
    }

    /// The handler bound at the matched node, if any.
    #[must_use]
    pub fn handler(&self) -> Option<&'a Handler> {
        self.node.handler()
    }

    /// The registered pattern of the matched route, if a handler was
    /// bound at the node.
    #[must_use]
    pub fn pattern(&self) -> Option<&'a str> {
        self.node.route()
    }

    /// All params bound during the walk.
    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// A single param value by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Consume the match, keeping only the params.
    #[must_use]
    pub fn into_params(self) -> HashMap<String, String> {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::Router;
    use trellis_core::{Context, Method, handler};

    #[test]
    fn param_accessors() {
        let mut router = Router::new();
        router
            .add_route(
                Method::Get,
                "/user/:id/posts/:post",
                handler(|_ctx: &mut Context<'_>| {}),
            )
            .unwrap();

        let found = router.find_route(Method::Get, "/user/7/posts/99").unwrap();
        assert_eq!(found.param("id"), Some("7"));
        assert_eq!(found.param("post"), Some("99"));
        assert_eq!(found.param("absent"), None);
        assert_eq!(found.params().len(), 2);

        let params = found.into_params();
        assert_eq!(params["id"], "7");
        assert_eq!(params["post"], "99");
    }
}
