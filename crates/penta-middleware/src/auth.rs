//! Authentication chain.
//!
//! An operation's auth chain is a list of [`Authenticator`]s tried in
//! declared order. The first one that returns an identity wins; an error
//! stops the chain and propagates as-is.
//!
//! ## Built-ins
//!
//! | Authenticator | Credential |
//! |---|---|
//! | [`ApiKeyQuery`] | query parameter |
//! | [`ApiKeyHeader`] | request header |
//! | [`ApiKeyCookie`] | cookie |
//! | [`HttpBearer`] | `Authorization: Bearer <token>` |
//! | [`HttpBasic`] | `Authorization: Basic <base64(user:password)>` |
//!
//! Each built-in extracts the credential and hands it to a verifier closure,
//! and contributes an OpenAPI security scheme.
//!
//! ## Example
//!
//! ```rust
//! use penta_core::{Identity, Request};
//! use penta_middleware::{ApiKeyHeader, AuthGate};
//! use std::sync::Arc;
//!
//! let gate = AuthGate::new(vec![Arc::new(ApiKeyHeader::new("X-API-Key", |key| {
//!     Ok((key == "secret").then(|| Identity::api_key("k1")))
//! }))]);
//!
//! let request = Request::builder().header("x-api-key", "secret").build();
//! let identity = tokio_test::block_on(gate.check(&request)).unwrap();
//! assert_eq!(identity, Identity::api_key("k1"));
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use penta_core::{BoxFuture, Identity, PentaError, PentaResult, Request};
use penta_docs::{ParameterIn, SecurityScheme};
use penta_extract::MultiMap;
use std::fmt;
use std::sync::Arc;

/// Authorization header for bearer and basic credentials.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Verifies a single extracted credential.
pub type Verifier = Arc<dyn Fn(&str) -> PentaResult<Option<Identity>> + Send + Sync>;

/// Verifies a username and password pair.
pub type BasicVerifier = Arc<dyn Fn(&str, &str) -> PentaResult<Option<Identity>> + Send + Sync>;

/// One member of an auth chain.
///
/// Returning `Ok(None)` declines the request and lets the next member try.
/// Plain closures `Fn(&Request) -> PentaResult<Option<Identity>>` implement
/// this trait.
pub trait Authenticator: Send + Sync + 'static {
    /// Attempts to authenticate `request`.
    fn authenticate<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, PentaResult<Option<Identity>>>;

    /// The OpenAPI security scheme this authenticator documents, by name.
    fn security_scheme(&self) -> Option<(String, SecurityScheme)> {
        None
    }
}

impl<F> Authenticator for F
where
    F: Fn(&Request) -> PentaResult<Option<Identity>> + Send + Sync + 'static,
{
    fn authenticate<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, PentaResult<Option<Identity>>> {
        let outcome = self(request);
        Box::pin(std::future::ready(outcome))
    }
}

/// Shared shape of the three API key authenticators.
#[derive(Clone)]
struct ApiKey {
    param: String,
    scheme_name: String,
    verify: Verifier,
}

impl ApiKey {
    fn new<F>(param: impl Into<String>, default_name: &str, verify: F) -> Self
    where
        F: Fn(&str) -> PentaResult<Option<Identity>> + Send + Sync + 'static,
    {
        Self {
            param: param.into(),
            scheme_name: default_name.to_string(),
            verify: Arc::new(verify),
        }
    }

    fn check(&self, key: Option<&str>) -> PentaResult<Option<Identity>> {
        match key {
            Some(key) if !key.is_empty() => (self.verify)(key),
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("param", &self.param)
            .field("scheme_name", &self.scheme_name)
            .finish_non_exhaustive()
    }
}

macro_rules! api_key_authenticator {
    ($(#[$meta:meta])* $name:ident, $location:expr, |$this:ident, $request:ident| $extract:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(ApiKey);

        impl $name {
            /// Reads the key named `param` and passes it to `verify`.
            #[must_use]
            pub fn new<F>(param: impl Into<String>, verify: F) -> Self
            where
                F: Fn(&str) -> PentaResult<Option<Identity>> + Send + Sync + 'static,
            {
                Self(ApiKey::new(param, stringify!($name), verify))
            }

            /// Overrides the name of the documented security scheme.
            #[must_use]
            pub fn scheme_name(mut self, name: impl Into<String>) -> Self {
                self.0.scheme_name = name.into();
                self
            }
        }

        impl Authenticator for $name {
            fn authenticate<'a>(&'a self, $request: &'a Request) -> BoxFuture<'a, PentaResult<Option<Identity>>> {
                let $this = &self.0;
                let key: Option<String> = $extract;
                Box::pin(std::future::ready($this.check(key.as_deref())))
            }

            fn security_scheme(&self) -> Option<(String, SecurityScheme)> {
                Some((
                    self.0.scheme_name.clone(),
                    SecurityScheme::api_key($location, self.0.param.clone()),
                ))
            }
        }
    };
}

api_key_authenticator!(
    /// API key read from a query parameter.
    ApiKeyQuery,
    ParameterIn::Query,
    |this, request| MultiMap::parse(request.query_string().unwrap_or_default())
        .last(&this.param)
        .map(str::to_string)
);

api_key_authenticator!(
    /// API key read from a request header (case-insensitive).
    ApiKeyHeader,
    ParameterIn::Header,
    |this, request| request.header(&this.param).map(str::to_string)
);

api_key_authenticator!(
    /// API key read from a cookie.
    ApiKeyCookie,
    ParameterIn::Cookie,
    |this, request| request.cookies().get(&this.param).map(str::to_string)
);

/// Splits an `Authorization` value into its scheme and credentials.
fn authorization<'r>(request: &'r Request, scheme: &str) -> Option<&'r str> {
    let value = request.header(AUTHORIZATION_HEADER)?;
    let (given, credentials) = value.trim().split_once(' ')?;
    given
        .eq_ignore_ascii_case(scheme)
        .then(|| credentials.trim())
        .filter(|credentials| !credentials.is_empty())
}

/// `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct HttpBearer {
    verify: Verifier,
    scheme_name: String,
    bearer_format: Option<String>,
}

impl HttpBearer {
    /// Passes the bearer token to `verify`.
    #[must_use]
    pub fn new<F>(verify: F) -> Self
    where
        F: Fn(&str) -> PentaResult<Option<Identity>> + Send + Sync + 'static,
    {
        Self {
            verify: Arc::new(verify),
            scheme_name: "HttpBearer".to_string(),
            bearer_format: None,
        }
    }

    /// Overrides the name of the documented security scheme.
    #[must_use]
    pub fn scheme_name(mut self, name: impl Into<String>) -> Self {
        self.scheme_name = name.into();
        self
    }

    /// Documents the token format, e.g. `JWT`.
    #[must_use]
    pub fn bearer_format(mut self, format: impl Into<String>) -> Self {
        self.bearer_format = Some(format.into());
        self
    }
}

impl fmt::Debug for HttpBearer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBearer")
            .field("scheme_name", &self.scheme_name)
            .finish_non_exhaustive()
    }
}

impl Authenticator for HttpBearer {
    fn authenticate<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, PentaResult<Option<Identity>>> {
        let outcome = match authorization(request, "bearer") {
            Some(token) => (self.verify)(token),
            None => Ok(None),
        };
        Box::pin(std::future::ready(outcome))
    }

    fn security_scheme(&self) -> Option<(String, SecurityScheme)> {
        let mut scheme = SecurityScheme::http("bearer");
        scheme.bearer_format.clone_from(&self.bearer_format);
        Some((self.scheme_name.clone(), scheme))
    }
}

/// `Authorization: Basic <base64(user:password)>`.
///
/// Credentials that are not valid base64 or lack a `:` are declined.
#[derive(Clone)]
pub struct HttpBasic {
    verify: BasicVerifier,
    scheme_name: String,
}

impl HttpBasic {
    /// Passes the decoded username and password to `verify`.
    #[must_use]
    pub fn new<F>(verify: F) -> Self
    where
        F: Fn(&str, &str) -> PentaResult<Option<Identity>> + Send + Sync + 'static,
    {
        Self {
            verify: Arc::new(verify),
            scheme_name: "HttpBasic".to_string(),
        }
    }

    /// Overrides the name of the documented security scheme.
    #[must_use]
    pub fn scheme_name(mut self, name: impl Into<String>) -> Self {
        self.scheme_name = name.into();
        self
    }

    fn decode(encoded: &str) -> Option<(String, String)> {
        let bytes = STANDARD.decode(encoded).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        let (user, password) = text.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }
}

impl fmt::Debug for HttpBasic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBasic")
            .field("scheme_name", &self.scheme_name)
            .finish_non_exhaustive()
    }
}

impl Authenticator for HttpBasic {
    fn authenticate<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, PentaResult<Option<Identity>>> {
        let outcome = match authorization(request, "basic").and_then(Self::decode) {
            Some((user, password)) => (self.verify)(&user, &password),
            None => Ok(None),
        };
        Box::pin(std::future::ready(outcome))
    }

    fn security_scheme(&self) -> Option<(String, SecurityScheme)> {
        Some((self.scheme_name.clone(), SecurityScheme::http("basic")))
    }
}

/// An ordered auth chain.
///
/// An empty gate admits every request as [`Identity::Anonymous`].
#[derive(Clone, Default)]
pub struct AuthGate {
    chain: Vec<Arc<dyn Authenticator>>,
}

impl AuthGate {
    /// Creates a gate over `chain`.
    #[must_use]
    pub fn new(chain: Vec<Arc<dyn Authenticator>>) -> Self {
        Self { chain }
    }

    /// Returns the number of authenticators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns `true` if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Security schemes documented by the chain, in chain order.
    #[must_use]
    pub fn security_schemes(&self) -> Vec<(String, SecurityScheme)> {
        self.chain
            .iter()
            .filter_map(|authenticator| authenticator.security_scheme())
            .collect()
    }

    /// Runs the chain against `request`.
    ///
    /// # Errors
    ///
    /// Returns [`PentaError::unauthorized`] when every authenticator declines,
    /// or the first error an authenticator raised.
    pub async fn check(&self, request: &Request) -> PentaResult<Identity> {
        if self.chain.is_empty() {
            return Ok(Identity::Anonymous);
        }
        for (position, authenticator) in self.chain.iter().enumerate() {
            if let Some(identity) = authenticator.authenticate(request).await? {
                tracing::debug!(
                    position,
                    identity = %identity.log_id(),
                    "request authenticated"
                );
                return Ok(identity);
            }
        }
        tracing::debug!(
            http.path = %request.path(),
            authenticators = self.chain.len(),
            "every authenticator declined"
        );
        Err(PentaError::unauthorized())
    }
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("authenticators", &self.chain.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penta_core::ErrorCategory;

    fn key_is(expected: &'static str, id: &'static str) -> impl Fn(&str) -> PentaResult<Option<Identity>> {
        move |key: &str| Ok((key == expected).then(|| Identity::api_key(id)))
    }

    fn gate(chain: Vec<Arc<dyn Authenticator>>) -> AuthGate {
        AuthGate::new(chain)
    }

    #[tokio::test]
    async fn test_empty_chain_is_anonymous() {
        let identity = AuthGate::default().check(&Request::builder().build()).await.unwrap();
        assert_eq!(identity, Identity::Anonymous);
    }

    #[tokio::test]
    async fn test_first_accepting_authenticator_wins() {
        let gate = gate(vec![
            Arc::new(ApiKeyQuery::new("key", key_is("q-secret", "query"))),
            Arc::new(ApiKeyHeader::new("X-Key", key_is("h-secret", "header"))),
        ]);

        let header_only = Request::builder().header("x-key", "h-secret").build();
        assert_eq!(gate.check(&header_only).await.unwrap(), Identity::api_key("header"));

        let both = Request::builder()
            .uri("/?key=q-secret")
            .header("x-key", "h-secret")
            .build();
        assert_eq!(gate.check(&both).await.unwrap(), Identity::api_key("query"));
    }

    #[tokio::test]
    async fn test_all_declining_is_unauthorized() {
        let gate = gate(vec![Arc::new(ApiKeyHeader::new("X-Key", key_is("secret", "k")))]);
        let err = gate
            .check(&Request::builder().header("x-key", "wrong").build())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert_eq!(err.client_message(), "Unauthorized");
    }

    #[tokio::test]
    async fn test_errors_stop_the_chain() {
        let forbid = |_: &Request| -> PentaResult<Option<Identity>> {
            Err(PentaError::forbidden())
        };
        let accept = |_: &Request| -> PentaResult<Option<Identity>> { Ok(Some(Identity::user("u"))) };
        let gate = gate(vec![Arc::new(forbid), Arc::new(accept)]);
        let err = gate.check(&Request::builder().build()).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_cookie_key() {
        let gate = gate(vec![Arc::new(ApiKeyCookie::new("session", key_is("abc", "c")))]);
        let request = Request::builder().header("cookie", "theme=dark; session=abc").build();
        assert_eq!(gate.check(&request).await.unwrap(), Identity::api_key("c"));
    }

    #[tokio::test]
    async fn test_bearer() {
        let bearer = HttpBearer::new(|token| Ok((token == "tok").then(|| Identity::token("svc"))));
        let request = Request::builder().header("Authorization", "bearer  tok").build();
        assert_eq!(
            bearer.authenticate(&request).await.unwrap(),
            Some(Identity::token("svc"))
        );

        let wrong_scheme = Request::builder().header("Authorization", "Basic tok").build();
        assert_eq!(bearer.authenticate(&wrong_scheme).await.unwrap(), None);
        let empty = Request::builder().header("Authorization", "Bearer ").build();
        assert_eq!(bearer.authenticate(&empty).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_basic() {
        let basic = HttpBasic::new(|user, password| {
            Ok((user == "admin" && password == "p:w").then(|| Identity::user(user)))
        });
        let encoded = STANDARD.encode("admin:p:w");
        let request = Request::builder()
            .header("Authorization", &format!("Basic {encoded}"))
            .build();
        assert_eq!(
            basic.authenticate(&request).await.unwrap(),
            Some(Identity::user("admin"))
        );

        let garbage = Request::builder().header("Authorization", "Basic !!!").build();
        assert_eq!(basic.authenticate(&garbage).await.unwrap(), None);
    }

    #[test]
    fn test_security_schemes() {
        let gate = gate(vec![
            Arc::new(ApiKeyQuery::new("api_key", key_is("x", "x"))),
            Arc::new(ApiKeyCookie::new("sid", key_is("x", "x")).scheme_name("Session")),
            Arc::new(HttpBearer::new(|_| Ok(None)).bearer_format("JWT")),
            Arc::new(HttpBasic::new(|_, _| Ok(None))),
            Arc::new(|_: &Request| -> PentaResult<Option<Identity>> { Ok(None) }),
        ]);
        let schemes = gate.security_schemes();
        let names: Vec<&str> = schemes.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["ApiKeyQuery", "Session", "HttpBearer", "HttpBasic"]);
        assert_eq!(schemes[0].1, SecurityScheme::api_key(ParameterIn::Query, "api_key"));
        assert_eq!(schemes[2].1.bearer_format.as_deref(), Some("JWT"));
        assert_eq!(schemes[3].1.scheme.as_deref(), Some("basic"));
    }
}
