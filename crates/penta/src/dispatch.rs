//! Request dispatch.
//!
//! Steps for an operation request, in order: route, authenticate, throttle,
//! bind and validate, resolve dependencies, invoke the handler, shape the
//! reply and render it. Any error short-circuits into the exception handlers.

use crate::api::{Api, CompiledOperation};
use crate::responses::{shape_payload, Shape};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use penta_core::{
    BoundArgs, Call, Injected, ParamSource, PentaError, PentaResult, Reply, Request,
    RequestContext,
};
use penta_extract::{bind, resolve_plan, BoundValues, ParamSpec};
use penta_router::{normalize_path, RouteError};
use penta_telemetry::{log_request_complete, log_request_error, log_request_start};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

enum Target<'a> {
    Ready(Response<Bytes>),
    Operation(&'a CompiledOperation),
}

impl Api {
    /// Handles one request.
    ///
    /// Errors with a registered exception handler become responses; the
    /// others are returned.
    ///
    /// # Errors
    ///
    /// Returns any error no exception handler matched, or a rendering
    /// failure.
    pub async fn handle(&self, mut request: Request) -> PentaResult<Response<Bytes>> {
        let mut ctx = RequestContext::new();
        let method = request.method().clone();
        let path = request.path().to_string();

        let target = self.route(&mut request);
        let request = Arc::new(request);

        let result = match target {
            Ok(Target::Ready(response)) => {
                log_request_start!(ctx.request_id(), method, path, "-");
                Ok(response)
            }
            Ok(Target::Operation(op)) => {
                ctx = ctx.with_operation_id(op.operation_id.clone());
                log_request_start!(ctx.request_id(), method, path, op.operation_id);
                self.run(op, &mut ctx, &request).await
            }
            Err(error) => {
                log_request_start!(ctx.request_id(), method, path, "-");
                Err(error)
            }
        };

        let response = match result {
            Ok(response) => Ok(response),
            Err(error) => self.translate(&request, error),
        };

        match &response {
            Ok(response) => {
                let duration_ms = u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX);
                log_request_complete!(ctx.request_id(), response.status().as_u16(), duration_ms);
            }
            Err(error) => log_request_error!(ctx.request_id(), error),
        }
        response
    }

    /// Handles an `http::Request`.
    ///
    /// # Errors
    ///
    /// See [`Api::handle`].
    pub async fn handle_http(&self, request: http::Request<Bytes>) -> PentaResult<Response<Bytes>> {
        self.handle(Request::from_http(request)).await
    }

    fn route(&self, request: &mut Request) -> PentaResult<Target<'_>> {
        if let Some(response) = self.serve_docs(request)? {
            return Ok(Target::Ready(response));
        }
        let found = match self.tree.resolve(request.method(), request.path()) {
            Ok(found) => found,
            Err(RouteError::MethodNotAllowed { method, allowed }) => {
                return Err(PentaError::method_not_allowed(method, allowed));
            }
            Err(error) => return Err(PentaError::not_found(error.to_string())),
        };
        let index = *found.value;
        request.set_path_params(found.params);
        self.operations
            .get(index)
            .map(Target::Operation)
            .ok_or_else(|| PentaError::internal(format!("route points at missing operation {index}")))
    }

    fn serve_docs(&self, request: &Request) -> PentaResult<Option<Response<Bytes>>> {
        let Some(openapi_url) = &self.openapi_url else {
            return Ok(None);
        };
        if request.method() != Method::GET {
            return Ok(None);
        }
        let path = normalize_path(request.path());

        if normalize_path(openapi_url) == path {
            let document = self.generate_schema_document()?;
            return self
                .render(request, StatusCode::OK, Some(&document), HeaderMap::new())
                .map(Some);
        }
        if let Some(docs_url) = &self.docs_url {
            if normalize_path(docs_url) == path {
                let page = self.docs_page.render_bytes(self.title(), openapi_url);
                let mut response = Response::new(page);
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    async fn run(
        &self,
        op: &CompiledOperation,
        ctx: &mut RequestContext,
        request: &Arc<Request>,
    ) -> PentaResult<Response<Bytes>> {
        let identity = op.auth.check(request).await?;
        ctx.set_identity(identity);
        op.throttle.check(request, ctx.identity())?;

        let values = match bind(&op.schemas, request) {
            Ok(values) => values,
            Err(contexts) => {
                for context in contexts {
                    ctx.push_error_context(context);
                }
                return Err(PentaError::from_contexts(ctx.take_error_contexts()));
            }
        };
        let outputs = resolve_plan(&op.plan, &values, request, ctx.identity()).await?;
        ctx.set_args(assemble_args(&op.specs, &values, &outputs)?);

        let call = Call::new(ctx.clone(), Arc::clone(request));
        let reply = op.operation.handler().invoke(call).resolve().await?;
        self.shape(op, request, reply)
    }

    fn shape(&self, op: &CompiledOperation, request: &Request, reply: Reply) -> PentaResult<Response<Bytes>> {
        let (status, body, headers) = match reply {
            Reply::Raw(response) => return Ok(response),
            Reply::Data {
                status,
                body,
                headers,
            } => (status.unwrap_or_else(|| op.responses.default_status()), body, headers),
        };
        let payload = match op.responses.lookup(status)? {
            Shape::Unset => Some(body),
            Shape::Empty => None,
            Shape::Model { model, by_name } => {
                Some(shape_payload(model, by_name, status, &body, op.dump)?)
            }
        };
        self.render(request, status, payload.as_ref(), headers)
    }

    fn translate(&self, request: &Request, error: PentaError) -> PentaResult<Response<Bytes>> {
        let fallback = error.status_code();
        match self.translator.translate(request, error)? {
            Reply::Raw(response) => Ok(response),
            Reply::Data {
                status,
                body,
                headers,
            } => self.render(request, status.unwrap_or(fallback), Some(&body), headers),
        }
    }

    fn render(
        &self,
        request: &Request,
        status: StatusCode,
        payload: Option<&Value>,
        headers: HeaderMap,
    ) -> PentaResult<Response<Bytes>> {
        let mut response = match payload {
            Some(data) => {
                let bytes = self.renderer.render(request, data, status)?;
                let content_type = HeaderValue::from_str(&self.renderer.content_type()).map_err(|e| {
                    PentaError::internal_with_source("renderer produced an invalid content type", e)
                })?;
                let mut response = Response::new(bytes);
                response.headers_mut().insert(CONTENT_TYPE, content_type);
                response
            }
            None => Response::new(Bytes::new()),
        };
        *response.status_mut() = status;
        for (name, value) in &headers {
            response.headers_mut().append(name, value.clone());
        }
        Ok(response)
    }
}

fn assemble_args(
    specs: &[ParamSpec],
    values: &BoundValues,
    outputs: &HashMap<String, Injected>,
) -> PentaResult<BoundArgs> {
    let mut args = BoundArgs::new();
    for spec in specs {
        match spec.source {
            ParamSource::Request => args.insert_request(&spec.name),
            ParamSource::Dependency => {
                let dependency = spec.dependency.as_deref().unwrap_or_default();
                let output = outputs.get(dependency).cloned().ok_or_else(|| {
                    PentaError::internal(format!(
                        "dependency '{dependency}' for '{}' was not resolved",
                        spec.name
                    ))
                })?;
                args.insert_injected(&spec.name, output);
            }
            _ => args.insert_value(
                &spec.name,
                values.get(&spec.name).cloned().unwrap_or(Value::Null),
            ),
        }
    }
    Ok(args)
}
