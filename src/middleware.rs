use crate::identity;
use crate::limiter::RequestLimiter;
use crate::store::CounterStore;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Plain-text body sent with every rejection.
pub const DENIED_BODY: &str = "You have reached the maximum number of allowed requests";

/// A layer that gates every request through a [`RequestLimiter`].
pub struct RateLimitLayer<S> {
    limiter: Arc<RequestLimiter<S>>,
}

impl<S> RateLimitLayer<S> {
    /// Create a new rate limit layer.
    pub fn new(limiter: RequestLimiter<S>) -> Self {
        Self { limiter: Arc::new(limiter) }
    }
}

impl<S> Clone for RateLimitLayer<S> {
    fn clone(&self) -> Self {
        Self { limiter: Arc::clone(&self.limiter) }
    }
}

impl<Svc, S> Layer<Svc> for RateLimitLayer<S> {
    type Service = RateLimitService<Svc, S>;

    fn layer(&self, service: Svc) -> Self::Service {
        RateLimitService { inner: service, limiter: self.limiter.clone() }
    }
}

/// Middleware service that admits or rejects each request before the inner
/// service sees it.
///
/// Rejected requests short-circuit with `429 Too Many Requests` and
/// [`DENIED_BODY`]; the inner service is never called for them. The response
/// is deliberately identical whether the budget was exhausted or the counter
/// store was unreachable.
pub struct RateLimitService<Svc, S> {
    inner: Svc,
    limiter: Arc<RequestLimiter<S>>,
}

impl<Svc: Clone, S> Clone for RateLimitService<Svc, S> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), limiter: Arc::clone(&self.limiter) }
    }
}

impl<Svc, S, ReqBody, ResBody> Service<Request<ReqBody>> for RateLimitService<Svc, S>
where
    Svc: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    Svc::Future: Send + 'static,
    S: CounterStore + 'static,
    ReqBody: Send + 'static,
    ResBody: From<&'static str>,
{
    type Response = Svc::Response;
    type Error = Svc::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();
        let ip = identity::client_ip(&req);
        let token = identity::api_token(&req).to_string();

        Box::pin(async move {
            let allowed = limiter.allow_request(&ip, &token).await;
            tracing::info!(ip = %ip, has_token = !token.is_empty(), allowed, "rate limit verdict");
            if allowed {
                inner.call(req).await
            } else {
                Ok(too_many_requests())
            }
        })
    }
}

fn too_many_requests<B: From<&'static str>>() -> Response<B> {
    let mut res = Response::new(B::from(DENIED_BODY));
    *res.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    res
}
