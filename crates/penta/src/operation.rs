//! Operation declarations.
//!
//! An [`Operation`] pairs a handler with its parameter declarations and the
//! settings that shape the request pipeline: authentication, throttling,
//! response models and documentation metadata. Settings left unset are
//! inherited from the router the operation is mounted on, then from the API.
//!
//! # Example
//!
//! ```rust
//! use penta::extract::{FieldType, Param};
//! use penta::{Operation, Responses};
//! use penta::core::{Call, PentaResult, Reply};
//! use serde_json::json;
//!
//! let op = Operation::sync("items::get_item", |call: Call| -> PentaResult<Reply> {
//!     let item_id: i64 = call.arg("item_id")?;
//!     Ok(Reply::new(json!({ "item_id": item_id })))
//! })
//! .param(Param::new("item_id", FieldType::Integer))
//! .responses(Responses::new().status(200, None))
//! .tag("items");
//!
//! assert_eq!(op.effective_operation_id(), "items_get_item");
//! assert_eq!(op.effective_summary(), "Get Item");
//! ```

use crate::responses::{DumpSettings, Responses};
use penta_core::naming::{operation_id_from_name, short_name, title_case};
use penta_core::{async_handler, sync_handler, Call, Handler, PentaResult, Reply};
use penta_extract::Param;
use penta_middleware::{Authenticator, Throttle};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Authentication declared at one level of the API.
#[derive(Clone, Default)]
pub enum AuthSetting {
    /// Use the enclosing router's (or API's) chain.
    #[default]
    Inherit,
    /// No authentication, even if a parent declares some.
    Disabled,
    /// Try these authenticators in order.
    Chain(Vec<Arc<dyn Authenticator>>),
}

impl AuthSetting {
    /// Resolves against the chain of the enclosing level.
    pub(crate) fn resolve(&self, parent: &[Arc<dyn Authenticator>]) -> Vec<Arc<dyn Authenticator>> {
        match self {
            Self::Inherit => parent.to_vec(),
            Self::Disabled => Vec::new(),
            Self::Chain(chain) => chain.clone(),
        }
    }

    pub(crate) fn push(&mut self, authenticator: Arc<dyn Authenticator>) {
        match self {
            Self::Chain(chain) => chain.push(authenticator),
            _ => *self = Self::Chain(vec![authenticator]),
        }
    }
}

impl fmt::Debug for AuthSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inherit => f.write_str("Inherit"),
            Self::Disabled => f.write_str("Disabled"),
            Self::Chain(chain) => f.debug_tuple("Chain").field(&chain.len()).finish(),
        }
    }
}

/// A handler plus everything the dispatcher needs to call it.
#[derive(Clone)]
pub struct Operation {
    handler: Arc<dyn Handler>,
    params: Vec<Param>,
    pub(crate) auth: AuthSetting,
    pub(crate) throttles: Option<Vec<Arc<dyn Throttle>>>,
    pub(crate) responses: Responses,
    operation_id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    pub(crate) tags: Option<Vec<String>>,
    deprecated: bool,
    include_in_schema: bool,
    url_name: Option<String>,
    openapi_extra: Map<String, Value>,
    pub(crate) dump: DumpSettings,
}

impl Operation {
    /// Creates an operation for `handler`.
    #[must_use]
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            params: Vec::new(),
            auth: AuthSetting::Inherit,
            throttles: None,
            responses: Responses::new(),
            operation_id: None,
            summary: None,
            description: None,
            tags: None,
            deprecated: false,
            include_in_schema: true,
            url_name: None,
            openapi_extra: Map::new(),
            dump: DumpSettings::default(),
        }
    }

    /// Creates an operation from a plain function.
    #[must_use]
    pub fn sync<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Call) -> PentaResult<Reply> + Send + Sync + 'static,
    {
        Self::new(sync_handler(name, func))
    }

    /// Creates an operation from a function returning a future.
    #[must_use]
    pub fn asynchronous<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Call) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PentaResult<Reply>> + Send + 'static,
    {
        Self::new(async_handler(name, func))
    }

    /// Declares a handler parameter.
    #[must_use]
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Appends an authenticator to this operation's own chain.
    #[must_use]
    pub fn auth(mut self, authenticator: impl Authenticator) -> Self {
        self.auth.push(Arc::new(authenticator));
        self
    }

    /// Replaces the chain with already shared authenticators.
    #[must_use]
    pub fn auth_chain(mut self, chain: Vec<Arc<dyn Authenticator>>) -> Self {
        self.auth = AuthSetting::Chain(chain);
        self
    }

    /// Turns authentication off for this operation.
    #[must_use]
    pub fn no_auth(mut self) -> Self {
        self.auth = AuthSetting::Disabled;
        self
    }

    /// Appends a throttle to this operation's own list.
    #[must_use]
    pub fn throttle(mut self, throttle: impl Throttle) -> Self {
        self.throttles
            .get_or_insert_with(Vec::new)
            .push(Arc::new(throttle));
        self
    }

    /// Turns throttling off for this operation.
    #[must_use]
    pub fn no_throttle(mut self) -> Self {
        self.throttles = Some(Vec::new());
        self
    }

    /// Replaces the response declarations.
    #[must_use]
    pub fn responses(mut self, responses: Responses) -> Self {
        self.responses = responses;
        self
    }

    /// Declares one response status.
    #[must_use]
    pub fn response(mut self, code: u16, model: Option<penta_extract::Model>) -> Self {
        self.responses = self.responses.status(code, model);
        self
    }

    /// Sets an explicit operation id.
    #[must_use]
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    /// Sets the summary.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    /// Marks the operation deprecated.
    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Controls whether the operation appears in the schema document.
    #[must_use]
    pub fn include_in_schema(mut self, include: bool) -> Self {
        self.include_in_schema = include;
        self
    }

    /// Sets the name used for reverse URL lookup.
    #[must_use]
    pub fn url_name(mut self, name: impl Into<String>) -> Self {
        self.url_name = Some(name.into());
        self
    }

    /// Merges extra keys into the documented operation object.
    #[must_use]
    pub fn openapi_extra(mut self, extra: Map<String, Value>) -> Self {
        self.openapi_extra.extend(extra);
        self
    }

    /// Emit wire names when dumping response models.
    #[must_use]
    pub fn by_alias(mut self, on: bool) -> Self {
        self.dump.by_alias = Some(on);
        self
    }

    /// Drop `null` fields when dumping response models.
    #[must_use]
    pub fn exclude_none(mut self, on: bool) -> Self {
        self.dump.exclude_none = Some(on);
        self
    }

    /// Drop fields equal to their default when dumping response models.
    #[must_use]
    pub fn exclude_defaults(mut self, on: bool) -> Self {
        self.dump.exclude_defaults = Some(on);
        self
    }

    pub(crate) fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub(crate) fn params(&self) -> &[Param] {
        &self.params
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.handler.name()
    }

    /// Returns the operation id, derived from the handler name when unset.
    #[must_use]
    pub fn effective_operation_id(&self) -> String {
        self.operation_id
            .clone()
            .unwrap_or_else(|| operation_id_from_name(self.handler.name()))
    }

    /// Returns the summary, derived from the handler name when unset.
    #[must_use]
    pub fn effective_summary(&self) -> String {
        self.summary
            .clone()
            .unwrap_or_else(|| title_case(short_name(self.handler.name())))
    }

    pub(crate) fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) const fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub(crate) const fn is_documented(&self) -> bool {
        self.include_in_schema
    }

    pub(crate) fn extra(&self) -> &Map<String, Value> {
        &self.openapi_extra
    }

    /// Returns the reverse-lookup name, the short handler name when unset.
    #[must_use]
    pub fn reverse_name(&self) -> &str {
        self.url_name
            .as_deref()
            .unwrap_or_else(|| short_name(self.handler.name()))
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("handler", &self.handler.name())
            .field("params", &self.params.len())
            .field("auth", &self.auth)
            .field("responses", &self.responses)
            .finish_non_exhaustive()
    }
}
