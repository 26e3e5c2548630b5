//! Trie registration and lookup.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use trellis_core::{Handler, Method};

use crate::r#match::RouteMatch;

/// Registration-time configuration error.
///
/// These are fatal: they surface immediately to the registering caller
/// and are expected to be fixed at the call site before serving begins.
#[derive(Debug)]
pub enum RouteError {
    /// The path is empty.
    EmptyPath,
    /// The path does not start with `/`.
    MissingLeadingSlash {
        /// The offending path.
        path: String,
    },
    /// The path is not `/` but ends with `/`.
    TrailingSlash {
        /// The offending path.
        path: String,
    },
    /// The path contains consecutive `/` characters.
    EmptySegment {
        /// The offending path.
        path: String,
    },
    /// A handler is already bound at this path.
    DuplicateRoute {
        /// The offending path.
        path: String,
    },
    /// The parent already has a named-param child with another name.
    ParamConflict {
        /// The segment already registered.
        existing: String,
        /// The segment being registered.
        offered: String,
    },
    /// The parent already has a structurally different regex child.
    RegexConflict {
        /// The segment already registered.
        existing: String,
        /// The segment being registered.
        offered: String,
    },
    /// The regex pattern failed to compile.
    InvalidPattern {
        /// The segment holding the pattern.
        segment: String,
        /// The compile error.
        source: regex::Error,
    },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "route path is empty"),
            Self::MissingLeadingSlash { path } => {
                write!(f, "route path {path:?} must start with '/'")
            }
            Self::TrailingSlash { path } => {
                write!(f, "route path {path:?} must not end with '/'")
            }
            Self::EmptySegment { path } => {
                write!(f, "route path {path:?} contains an empty segment")
            }
            Self::DuplicateRoute { path } => {
                write!(f, "a handler is already registered at {path:?}")
            }
            Self::ParamConflict { existing, offered } => write!(
                f,
                "param segment {offered:?} conflicts with existing {existing:?}"
            ),
            Self::RegexConflict { existing, offered } => write!(
                f,
                "regex segment {offered:?} conflicts with existing {existing:?}"
            ),
            Self::InvalidPattern { segment, source } => {
                write!(f, "invalid pattern in segment {segment:?}: {source}")
            }
        }
    }
}

impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidPattern { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Classification of one registered path segment.
#[derive(Debug)]
enum SegmentKind {
    Static,
    Param { name: String },
    Regex { keys: Vec<String>, pattern: String },
    Wildcard,
}

impl SegmentKind {
    fn classify(segment: &str) -> Self {
        if segment == "*" {
            return Self::Wildcard;
        }
        let Some(rest) = segment.strip_prefix(':') else {
            return Self::Static;
        };
        match split_regex_form(segment) {
            Some((keys, pattern)) => Self::Regex { keys, pattern },
            None => Self::Param {
                name: rest.to_string(),
            },
        }
    }
}

/// Split a `(:key)+\((pattern)\)` segment into its key list and pattern
/// body. Empty key names (as in `:(.*)`) are dropped, declaring zero
/// keys. Returns `None` when the segment is not in regex form.
fn split_regex_form(segment: &str) -> Option<(Vec<String>, String)> {
    if !segment.starts_with(':') || !segment.ends_with(')') {
        return None;
    }
    let open = segment.find('(')?;
    let prefix = &segment[..open];
    let keys = prefix
        .split(':')
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect();
    let pattern = segment[open + 1..segment.len() - 1].to_string();
    Some((keys, pattern))
}

/// What one registered segment is, as stored on its node.
#[derive(Debug)]
pub(crate) enum NodeKind {
    /// Literal text, matched exactly. The tree root is static `/`.
    Static,
    /// `:name`, binding the matching segment's literal value.
    Param { name: String },
    /// `(:key)+((pattern))`, binding capture groups to keys.
    ///
    /// The stored regex is the registered pattern body wrapped in
    /// `^(?:…)$` so a lookup match must cover the whole segment.
    Regex { regex: Regex, keys: Vec<String> },
    /// `*`. `absorbing` is set when the wildcard ends its registered
    /// path: it then matches all remaining segments, slashes included.
    Wildcard { absorbing: bool },
}

/// The next move of a lookup walk at one node.
enum Step<'a> {
    /// Enter a child and continue with the next segment.
    Descend(&'a Node),
    /// Terminate: this absorbing wildcard consumes the rest of the path.
    Absorb(&'a Node),
}

/// One trie vertex.
pub struct Node {
    pub(crate) segment: String,
    pub(crate) kind: NodeKind,
    pub(crate) children: HashMap<String, Node>,
    pub(crate) regex_child: Option<Box<Node>>,
    pub(crate) param_child: Option<Box<Node>>,
    pub(crate) wildcard_child: Option<Box<Node>>,
    pub(crate) handler: Option<Handler>,
    pub(crate) route: Option<String>,
}

impl Node {
    fn new(segment: &str, kind: NodeKind) -> Self {
        Self {
            segment: segment.to_string(),
            kind,
            children: HashMap::new(),
            regex_child: None,
            param_child: None,
            wildcard_child: None,
            handler: None,
            route: None,
        }
    }

    fn root() -> Self {
        Self::new("/", NodeKind::Static)
    }

    /// The registered segment text of this node.
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// The handler bound at this node, if any.
    #[must_use]
    pub fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    /// The full registered path whose final node this is, if a handler
    /// was bound here.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Whether a handler is bound at this node.
    #[must_use]
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    fn absorbs_remainder(&self) -> bool {
        matches!(self.kind, NodeKind::Wildcard { absorbing: true })
    }

    /// Get or create the child for one registered segment.
    fn child_for<'n>(node: &'n mut Node, segment: &str) -> Result<&'n mut Node, RouteError> {
        match SegmentKind::classify(segment) {
            SegmentKind::Static => Ok(node
                .children
                .entry(segment.to_string())
                .or_insert_with(|| Node::new(segment, NodeKind::Static))),
            SegmentKind::Param { name } => {
                if let Some(existing) = &node.param_child {
                    if existing.segment != segment {
                        return Err(RouteError::ParamConflict {
                            existing: existing.segment.clone(),
                            offered: segment.to_string(),
                        });
                    }
                }
                Ok(node
                    .param_child
                    .get_or_insert_with(|| Box::new(Node::new(segment, NodeKind::Param { name })))
                    .as_mut())
            }
            SegmentKind::Regex { keys, pattern } => {
                match &node.regex_child {
                    Some(existing) if existing.segment != segment => {
                        return Err(RouteError::RegexConflict {
                            existing: existing.segment.clone(),
                            offered: segment.to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        // The pattern body is registered unanchored; the
                        // compiled form must cover the whole segment.
                        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
                            RouteError::InvalidPattern {
                                segment: segment.to_string(),
                                source,
                            }
                        })?;
                        node.regex_child =
                            Some(Box::new(Node::new(segment, NodeKind::Regex { regex, keys })));
                    }
                }
                match node.regex_child.as_deref_mut() {
                    Some(child) => Ok(child),
                    None => unreachable!("regex child ensured above"),
                }
            }
            SegmentKind::Wildcard => Ok(node
                .wildcard_child
                .get_or_insert_with(|| {
                    Box::new(Node::new(segment, NodeKind::Wildcard { absorbing: false }))
                })
                .as_mut()),
        }
    }

    /// Resolve one request segment against this node's children,
    /// applying the static > regex > param > wildcard priority.
    fn step<'n>(&'n self, segment: &str, params: &mut HashMap<String, String>) -> Option<Step<'n>> {
        if let Some(child) = self.children.get(segment) {
            return Some(Step::Descend(child));
        }
        if let Some(child) = self.regex_child.as_deref() {
            if let NodeKind::Regex { regex, keys } = &child.kind {
                if let Some(caps) = regex.captures(segment) {
                    // Declared key count must equal the pattern's capture
                    // groups; a mismatch is a per-request miss, not a
                    // registration fault.
                    if regex.captures_len() - 1 != keys.len() {
                        return None;
                    }
                    for (key, group) in keys.iter().zip(caps.iter().skip(1)) {
                        let value = group.map_or("", |m| m.as_str());
                        params.insert(key.clone(), value.to_string());
                    }
                    return Some(Step::Descend(child));
                }
            }
        }
        if let Some(child) = self.param_child.as_deref() {
            if let NodeKind::Param { name } = &child.kind {
                params.insert(name.clone(), segment.to_string());
                return Some(Step::Descend(child));
            }
        }
        if let Some(child) = self.wildcard_child.as_deref() {
            return Some(Step::Descend(child));
        }
        if self.absorbs_remainder() {
            return Some(Step::Absorb(self));
        }
        None
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("segment", &self.segment)
            .field("kind", &self.kind)
            .field("children", &self.children)
            .field("regex_child", &self.regex_child)
            .field("param_child", &self.param_child)
            .field("wildcard_child", &self.wildcard_child)
            .field("has_handler", &self.handler.is_some())
            .field("route", &self.route)
            .finish()
    }
}

/// One method's trie.
#[derive(Debug)]
pub struct RouteTree {
    root: Node,
}

impl RouteTree {
    /// Create an empty tree rooted at `/`.
    #[must_use]
    pub fn new() -> Self {
        Self { root: Node::root() }
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Register `handler` at `path`.
    ///
    /// Paths start with `/`, do not end with `/` (except `/` itself),
    /// and contain no empty segments.
    pub fn add_route(&mut self, path: &str, handler: Handler) -> Result<(), RouteError> {
        if path.is_empty() {
            return Err(RouteError::EmptyPath);
        }
        if !path.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash {
                path: path.to_string(),
            });
        }
        if path == "/" {
            if self.root.handler.is_some() {
                return Err(RouteError::DuplicateRoute {
                    path: path.to_string(),
                });
            }
            self.root.handler = Some(handler);
            self.root.route = Some(path.to_string());
            return Ok(());
        }
        if path.ends_with('/') {
            return Err(RouteError::TrailingSlash {
                path: path.to_string(),
            });
        }

        let mut node = &mut self.root;
        for segment in path[1..].split('/') {
            if segment.is_empty() {
                return Err(RouteError::EmptySegment {
                    path: path.to_string(),
                });
            }
            node = Node::child_for(node, segment)?;
        }
        if node.handler.is_some() {
            return Err(RouteError::DuplicateRoute {
                path: path.to_string(),
            });
        }
        // A path ending in `*` makes its wildcard node absorb everything
        // past this point, slashes included.
        if let NodeKind::Wildcard { absorbing } = &mut node.kind {
            *absorbing = true;
        }
        node.handler = Some(handler);
        node.route = Some(path.to_string());
        Ok(())
    }

    /// Resolve `path` against this tree.
    ///
    /// Total: absence is `None`. The returned node may have no bound
    /// handler (an interior vertex); callers must check.
    #[must_use]
    pub fn find_route(&self, path: &str) -> Option<RouteMatch<'_>> {
        if path == "/" {
            return Some(RouteMatch::new(&self.root, HashMap::new()));
        }
        let mut node = &self.root;
        let mut params = HashMap::new();
        for segment in path.trim_matches('/').split('/') {
            match node.step(segment, &mut params)? {
                Step::Descend(child) => node = child,
                Step::Absorb(terminal) => return Some(RouteMatch::new(terminal, params)),
            }
        }
        Some(RouteMatch::new(node, params))
    }
}

impl Default for RouteTree {
    fn default() -> Self {
        Self::new()
    }
}

/// The router forest: one [`RouteTree`] per method, created lazily.
#[derive(Debug, Default)]
pub struct Router {
    trees: HashMap<Method, RouteTree>,
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` at `path`.
    pub fn add_route(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
    ) -> Result<(), RouteError> {
        self.trees
            .entry(method)
            .or_default()
            .add_route(path, handler)
    }

    /// Resolve `path` in `method`'s tree. `None` when the method has no
    /// tree or nothing matches.
    #[must_use]
    pub fn find_route(&self, method: Method, path: &str) -> Option<RouteMatch<'_>> {
        self.trees.get(&method)?.find_route(path)
    }

    /// The tree for `method`, if any route was registered under it.
    #[must_use]
    pub fn tree(&self, method: Method) -> Option<&RouteTree> {
        self.trees.get(&method)
    }
}
