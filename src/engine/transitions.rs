//! engine::transitions
//!
//! Named transition strategies and route matching.
//!
//! A transition runs at the start of a navigation and may pause the engine
//! (through the intercept gate) to animate the outgoing page. It is chosen
//! by an explicit per-link name first, then by the first registered
//! from/to route pair matching the current and target URLs.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use super::Engine;
use crate::core::types::NormalizedUrl;

/// Why a registration was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("transition name is empty")]
    MissingName,

    #[error("transition '{0}' needs both a from and a to route, or neither")]
    IncompleteRoute(String),

    #[error("transition '{0}' is already registered")]
    Duplicate(String),
}

/// Matches a normalized URL exactly or by regular expression.
#[derive(Debug, Clone)]
pub enum RoutePattern {
    Exact(String),
    Regex(Regex),
}

impl RoutePattern {
    pub fn exact(path: impl Into<String>) -> Self {
        RoutePattern::Exact(path.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(RoutePattern::Regex)
    }

    pub fn matches(&self, url: &NormalizedUrl) -> bool {
        match self {
            RoutePattern::Exact(path) => path == url.as_str(),
            RoutePattern::Regex(re) => re.is_match(url.as_str()),
        }
    }
}

/// The route a transition runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionArgs {
    pub from: NormalizedUrl,
    pub to: NormalizedUrl,
}

pub type TransitionFn = Arc<dyn Fn(&Engine, &TransitionArgs) + Send + Sync>;

/// A named transition strategy.
#[derive(Clone)]
pub struct Transition {
    pub name: String,
    pub from: Option<RoutePattern>,
    pub to: Option<RoutePattern>,
    pub run: TransitionFn,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

impl Transition {
    /// A transition selected only by name.
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&Engine, &TransitionArgs) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            from: None,
            to: None,
            run: Arc::new(run),
        }
    }

    /// Also select this transition for navigations from `from` to `to`.
    pub fn route(mut self, from: RoutePattern, to: RoutePattern) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    fn matches_route(&self, args: &TransitionArgs) -> bool {
        match (&self.from, &self.to) {
            (Some(from), Some(to)) => from.matches(&args.from) && to.matches(&args.to),
            _ => false,
        }
    }
}

/// Registered transitions, in registration order.
#[derive(Debug, Default)]
pub struct TransitionRegistry {
    transitions: Vec<Transition>,
}

impl TransitionRegistry {
    pub fn register(&mut self, transition: Transition) -> Result<(), TransitionError> {
        if transition.name.trim().is_empty() {
            return Err(TransitionError::MissingName);
        }
        if transition.from.is_some() != transition.to.is_some() {
            return Err(TransitionError::IncompleteRoute(transition.name));
        }
        if self.get(&transition.name).is_some() {
            return Err(TransitionError::Duplicate(transition.name));
        }
        self.transitions.push(transition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Pick the transition for a navigation. An explicit name wins; an
    /// unknown explicit name falls through to route matching.
    pub fn resolve(&self, explicit: Option<&str>, args: &TransitionArgs) -> Option<Transition> {
        if let Some(name) = explicit {
            match self.get(name) {
                Some(t) => return Some(t.clone()),
                None => tracing::warn!("link requests unknown transition '{}'", name),
            }
        }
        self.transitions
            .iter()
            .find(|t| t.matches_route(args))
            .cloned()
    }
}
