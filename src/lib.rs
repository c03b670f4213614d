//! Pluggable authentication and authorization for HTTP services.
//!
//! Every inbound request runs through one pipeline:
//!
//! 1. **Extract** a candidate [`Credential`] from the request: bearer token,
//!    API key, internal shared secret, gateway identity headers, or session
//!    cookie, in that order of precedence.
//! 2. **Validate** it into a [`Principal`] with the [`CredentialValidator`]
//!    registered for its source.
//! 3. **Authorize** the principal against the active [`PolicySet`].
//! 4. **Forward** a [`SecurityContext`] to the handler, or **reject** with a
//!    response from the [`ResponseMapper`] (401, 403 or 500).
//!
//! Access is fail-closed: a request no policy governs is denied. Policies can
//! be replaced at runtime through the [`PolicyStore`]; each request sees
//! either the old or the new set, never a mix.
//!
//! # Core Types
//!
//! - [`SecurityPipeline`]: Runs requests through the stages
//! - [`Secret<T>`]: Wrapper that redacts credential material in logs/output
//! - [`Principal`]: An authenticated identity; only the pipeline creates one
//! - [`Policy`]: Resource pattern + action + [`Requirement`]
//! - [`SecurityContext`]: What an authorized handler receives
//!
//! # Examples
//!
//! ```
//! use http::{Method, StatusCode};
//! use steak_security::{Outcome, RequestParts, SecurityConfig, SecurityPipeline};
//!
//! let config = SecurityConfig::from_json_str(r#"{
//!     "api_keys": [{ "key": "k-reporting", "subject": "reporting", "roles": ["reporter"] }],
//!     "policies": [
//!         { "resource": "/reports/**", "action": "GET", "roles": ["reporter"] },
//!         { "resource": "/admin/**", "roles": ["admin"] }
//!     ]
//! }"#).unwrap();
//! let pipeline = SecurityPipeline::from_config(config).unwrap();
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! runtime.block_on(async {
//!     let request = RequestParts::new(Method::GET, "/reports/daily")
//!         .with_header("X-Api-Key", "k-reporting");
//!     match pipeline.process(&request).await {
//!         Outcome::Forward(ctx) => assert_eq!(ctx.principal().subject(), "reporting"),
//!         Outcome::Reject(rejected) => panic!("unexpected {:?}", rejected),
//!     }
//!
//!     let request = RequestParts::new(Method::GET, "/admin/users")
//!         .with_header("X-Api-Key", "k-reporting");
//!     let outcome = pipeline.process(&request).await;
//!     let response = pipeline.respond(&outcome).unwrap();
//!     assert_eq!(response.status, StatusCode::FORBIDDEN);
//! });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod credential;
mod error;
mod evaluator;
mod logging;
mod pipeline;
mod policy;
mod principal;
mod request;
mod response;
mod scope;
mod secret;
mod state;
mod validator;

pub use config::{JwtConfig, SecurityConfig, INTERNAL_SECRET_ENV, JWT_SECRET_ENV};
pub use context::SecurityContext;
pub use credential::{
    Credential, CredentialExtractor, CredentialSource, ExtractCredential, ExtractorConfig,
    GatewayAssertion, GATEWAY_AUTHENTICATED_HEADER, GATEWAY_AUTHORITIES_HEADER,
    GATEWAY_DEVICE_ID_HEADER, GATEWAY_TENANT_ID_HEADER, GATEWAY_USER_ID_HEADER,
};
pub use error::{ConfigError, Error, RejectReason, Rejection};
pub use evaluator::{decide, AccessTarget, AuthorizationEvaluator, Decision};
pub use logging::RequestLog;
pub use pipeline::{Exchange, Outcome, Rejected, SecurityPipeline, SecurityPipelineBuilder};
pub use policy::{
    ActionMatcher, Policy, PolicyConfig, PolicySet, PolicyStore, Requirement, ResourcePattern,
    Specificity,
};
pub use principal::{Identity, Principal};
pub use request::{RequestParts, REQUEST_ID_HEADERS};
pub use response::{ResponseMapper, SecurityResponse, DEFAULT_REALM};
pub use scope::{Authorities, Permission, Scope};
pub use secret::Secret;
pub use state::{Authorized, Extracted, Pending, PipelineState, Stage, Validated};
pub use validator::{
    bearer_token, ApiKeyEntry, ApiKeyValidator, CachedKeyResolver, CredentialValidator,
    GatewayHeaderValidator, InternalSecretValidator, JwtSettings, JwtValidator, KeyError,
    KeyResolver, StaticKeyResolver, TokenClaims, ValidatorSet, INTERNAL_SUBJECT,
};
