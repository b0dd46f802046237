//! Declarative routing table.
//!
//! Paths map to pages; protected pages require a signed-in session and
//! otherwise redirect to sign-in, remembering where the visitor was going.

/// Pages reachable by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Home,
    Products,
    ProductDetail,
    Cart,
    Checkout,
    SignIn,
    SignUp,
    PasswordReset,
    Profile,
    Orders,
    OrderConfirmation,
    TrackOrder,
    Search,
    Contact,
    Blog,
    ShippingReturns,
    Faq,
    About,
    WhatWeDo,
}

/// One entry of the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Path pattern; `:name` segments capture one path segment.
    pub pattern: &'static str,
    pub page: Page,
    pub protected: bool,
}

const fn public(pattern: &'static str, page: Page) -> Route {
    Route {
        pattern,
        page,
        protected: false,
    }
}

const fn protected(pattern: &'static str, page: Page) -> Route {
    Route {
        pattern,
        page,
        protected: true,
    }
}

/// Where unauthenticated visitors of protected pages are sent.
pub const SIGN_IN_PATH: &str = "/signin";

/// The routing table.
pub const ROUTES: &[Route] = &[
    public("/", Page::Home),
    public("/products", Page::Products),
    public("/product/:id", Page::ProductDetail),
    public("/cart", Page::Cart),
    protected("/checkout", Page::Checkout),
    public("/signin", Page::SignIn),
    public("/signup", Page::SignUp),
    public("/password-reset", Page::PasswordReset),
    protected("/profile", Page::Profile),
    protected("/orders", Page::Orders),
    protected("/order-confirmation", Page::OrderConfirmation),
    public("/track-order", Page::TrackOrder),
    public("/search", Page::Search),
    public("/contact", Page::Contact),
    public("/blog", Page::Blog),
    public("/shipping-returns", Page::ShippingReturns),
    public("/faq", Page::Faq),
    public("/about", Page::About),
    public("/what-we-do", Page::WhatWeDo),
];

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Render {
        page: Page,
        params: Vec<(&'static str, String)>,
    },
    /// Go to `to`, then come back to `from` after signing in.
    Redirect { to: &'static str, from: String },
    NotFound,
}

impl RouteDecision {
    /// A captured path parameter of a rendered page.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        match self {
            Self::Render { params, .. } => params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }
}

/// Resolve `path` (query string and fragment ignored) for a visitor.
#[must_use]
pub fn resolve(path: &str, authenticated: bool) -> RouteDecision {
    let clean = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    for route in ROUTES {
        if let Some(params) = match_pattern(route.pattern, clean) {
            if route.protected && !authenticated {
                return RouteDecision::Redirect {
                    to: SIGN_IN_PATH,
                    from: path.to_string(),
                };
            }
            return RouteDecision::Render {
                page: route.page,
                params,
            };
        }
    }
    RouteDecision::NotFound
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn match_pattern(pattern: &'static str, path: &str) -> Option<Vec<(&'static str, String)>> {
    let mut pattern_segments = segments(pattern);
    let mut path_segments = segments(path);
    let mut params = Vec::new();

    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return Some(params),
            (Some(expected), Some(actual)) => {
                if let Some(name) = expected.strip_prefix(':') {
                    params.push((name, actual.to_string()));
                } else if expected != actual {
                    return None;
                }
            }
            _ => return None,
        }
    }
}
