//! The request security pipeline.
//!
//! Every request moves through the same stages:
//!
//! ```text
//! Pending --extract--> Extracted --validate--> Validated --authorize--> Authorized
//!    |                     |                       |
//!    +---------------------+-----------------------+----------------> Rejected
//! ```
//!
//! Each stage is a type-state of [`Exchange`]; a transition consumes the
//! exchange, so stages cannot be skipped or repeated. Only an `Authorized`
//! exchange yields a [`SecurityContext`].

use std::fmt;
use std::sync::Arc;

use tracing::Instrument;

use crate::context::SecurityContext;
use crate::credential::{Credential, CredentialExtractor, ExtractCredential};
use crate::error::{RejectReason, Rejection};
use crate::evaluator::{AccessTarget, AuthorizationEvaluator, Decision};
use crate::logging::RequestLog;
use crate::policy::{PolicySet, PolicyStore};
use crate::principal::Principal;
use crate::request::RequestParts;
use crate::response::{ResponseMapper, SecurityResponse};
use crate::state::{Authorized, Extracted, Pending, PipelineState, Stage, Validated};
use crate::validator::{CredentialValidator, ValidatorSet};

/// A request refused by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// Why
    pub rejection: Rejection,
    /// The stage the request had reached when it was refused
    pub state: PipelineState,
    /// Request id, as received or generated
    pub request_id: String,
}

impl Rejected {
    fn new(request_id: &str, state: PipelineState, rejection: Rejection) -> Self {
        RequestLog::new(request_id).rejected(state, &rejection);
        Self {
            rejection,
            state,
            request_id: request_id.to_string(),
        }
    }

    /// The rejection reason.
    pub fn reason(&self) -> RejectReason {
        self.rejection.reason
    }
}

/// Result of running a request through the pipeline.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Authorized; hand the context to the handler
    Forward(SecurityContext),
    /// Refused; send the mapped response instead
    Reject(Rejected),
}

impl Outcome {
    /// The terminal state.
    pub fn state(&self) -> PipelineState {
        match self {
            Outcome::Forward(_) => PipelineState::Authorized,
            Outcome::Reject(_) => PipelineState::Rejected,
        }
    }

    /// The context, if authorized.
    pub fn context(&self) -> Option<&SecurityContext> {
        match self {
            Outcome::Forward(context) => Some(context),
            Outcome::Reject(_) => None,
        }
    }

    /// The rejection, if refused.
    pub fn rejected(&self) -> Option<&Rejected> {
        match self {
            Outcome::Forward(_) => None,
            Outcome::Reject(rejected) => Some(rejected),
        }
    }
}

/// A request in flight, at stage `S`, holding `T` (nothing, a
/// [`Credential`], or a [`Principal`]).
pub struct Exchange<'p, S, T = ()> {
    pipeline: &'p SecurityPipeline,
    request: &'p RequestParts,
    request_id: String,
    value: T,
    _stage: S,
}

impl<S: Stage, T> Exchange<'_, S, T> {
    /// Request id, as received or generated.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The current stage.
    pub fn state(&self) -> PipelineState {
        S::STATE
    }

    fn log(&self) -> RequestLog<'_> {
        RequestLog::new(&self.request_id)
    }

    fn reject(self, rejection: Rejection) -> Rejected {
        Rejected::new(&self.request_id, S::STATE, rejection)
    }
}

impl<'p> Exchange<'p, Pending> {
    /// Looks for a credential.
    ///
    /// # Errors
    ///
    /// `MissingCredential` when no source yields one.
    pub fn extract(self) -> Result<Exchange<'p, Extracted, Credential>, Rejected> {
        match self.pipeline.extractor.extract(self.request) {
            Some(credential) => {
                self.log().stage(
                    PipelineState::Extracted,
                    format_args!("credential found in {}", credential.source()),
                );
                Ok(Exchange {
                    pipeline: self.pipeline,
                    request: self.request,
                    request_id: self.request_id,
                    value: credential,
                    _stage: Extracted::new(),
                })
            }
            None => Err(self.reject(Rejection::missing("no credential presented"))),
        }
    }
}

impl<'p> Exchange<'p, Extracted, Credential> {
    /// The extracted credential.
    pub fn credential(&self) -> &Credential {
        &self.value
    }

    /// Validates the credential.
    ///
    /// # Errors
    ///
    /// Whatever the validator registered for the credential's source rejects.
    pub async fn validate(self) -> Result<Exchange<'p, Validated, Principal>, Rejected> {
        let source = self.value.source();
        let validated = self.pipeline.validators.validate(&self.value).await;
        match validated {
            Ok(identity) => {
                let principal = Principal::from_validated(identity, source);
                self.log().stage(
                    PipelineState::Validated,
                    format_args!("authenticated {} via {}", principal.subject(), source),
                );
                Ok(Exchange {
                    pipeline: self.pipeline,
                    request: self.request,
                    request_id: self.request_id,
                    value: principal,
                    _stage: Validated::new(),
                })
            }
            Err(rejection) => Err(self.reject(rejection)),
        }
    }
}

impl<'p> Exchange<'p, Validated, Principal> {
    /// The authenticated principal.
    pub fn principal(&self) -> &Principal {
        &self.value
    }

    /// Evaluates policies for `target`.
    ///
    /// # Errors
    ///
    /// `InsufficientScope` or `ExpiredCredential` on denial.
    pub fn authorize(
        self,
        target: &AccessTarget,
    ) -> Result<Exchange<'p, Authorized, Principal>, Rejected> {
        match self.pipeline.evaluator.evaluate(&self.value, target) {
            Decision::Allow => {
                self.log()
                    .stage(PipelineState::Authorized, format_args!("allowed {}", target));
                Ok(Exchange {
                    pipeline: self.pipeline,
                    request: self.request,
                    request_id: self.request_id,
                    value: self.value,
                    _stage: Authorized::new(),
                })
            }
            Decision::Deny(reason) => {
                let detail = format!("{} denied {}", self.value.subject(), target);
                Err(self.reject(Rejection::new(reason, detail)))
            }
        }
    }
}

impl Exchange<'_, Authorized, Principal> {
    /// Finishes the exchange.
    pub fn into_context(self) -> SecurityContext {
        SecurityContext::new(self.request_id, self.value)
    }
}

impl<S: Stage, T> fmt::Debug for Exchange<'_, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("request_id", &self.request_id)
            .field("state", &S::STATE)
            .finish_non_exhaustive()
    }
}

/// Authenticates and authorizes requests.
///
/// The pipeline is immutable apart from its policy store, `Send + Sync`,
/// and meant to be shared behind an `Arc` for the life of the service.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use http::{Method, StatusCode};
/// use steak_security::{
///     CredentialSource, InternalSecretValidator, Policy, PolicySet, RequestParts,
///     Requirement, Secret, SecurityPipeline,
/// };
///
/// # tokio_test_block(async {
/// let pipeline = SecurityPipeline::builder()
///     .validator(
///         CredentialSource::InternalSecret,
///         InternalSecretValidator::new(Arc::new(Secret::from("shared"))),
///     )
///     .policies(PolicySet::new(vec![
///         Policy::parse("/internal/**", "*", Requirement::internal()).unwrap(),
///     ]))
///     .build();
///
/// let anonymous = RequestParts::new(Method::POST, "/internal/cache/flush");
/// let outcome = pipeline.process(&anonymous).await;
/// let response = pipeline.respond(&outcome).expect("rejected");
/// assert_eq!(response.status, StatusCode::UNAUTHORIZED);
///
/// let service = anonymous.with_header("X-Internal-Secret", "shared");
/// let outcome = pipeline.process(&service).await;
/// assert!(outcome.context().expect("forwarded").is_internal());
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
pub struct SecurityPipeline {
    extractor: Arc<dyn ExtractCredential>,
    validators: ValidatorSet,
    evaluator: AuthorizationEvaluator,
    mapper: ResponseMapper,
}

impl SecurityPipeline {
    /// Starts composing a pipeline.
    pub fn builder() -> SecurityPipelineBuilder {
        SecurityPipelineBuilder::default()
    }

    /// Starts an exchange for `request`.
    ///
    /// The request id comes from `X-Request-Id` or `X-TraceId`, or is
    /// generated.
    pub fn begin<'p>(&'p self, request: &'p RequestParts) -> Exchange<'p, Pending> {
        let request_id = request
            .request_id()
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Exchange {
            pipeline: self,
            request,
            request_id,
            value: (),
            _stage: Pending::new(),
        }
    }

    /// Runs `request` through every stage, authorizing its method on its path.
    pub async fn process(&self, request: &RequestParts) -> Outcome {
        let target = AccessTarget::from_request(request.method(), request.path());
        self.authorize(request, target).await
    }

    /// Runs `request` through every stage, authorizing an explicit target.
    pub async fn authorize(&self, request: &RequestParts, target: AccessTarget) -> Outcome {
        let exchange = self.begin(request);
        let span = tracing::debug_span!("security", request_id = %exchange.request_id());

        let result = async move {
            let authorized = exchange.extract()?.validate().await?.authorize(&target)?;
            Ok::<_, Rejected>(authorized.into_context())
        }
        .instrument(span)
        .await;

        match result {
            Ok(context) => Outcome::Forward(context),
            Err(rejected) => Outcome::Reject(rejected),
        }
    }

    /// The response to send for `outcome`; `None` when it should be forwarded.
    pub fn respond(&self, outcome: &Outcome) -> Option<SecurityResponse> {
        outcome
            .rejected()
            .map(|rejected| self.mapper.map(rejected.reason()))
    }

    /// The response mapper.
    pub fn mapper(&self) -> &ResponseMapper {
        &self.mapper
    }

    /// The policy store.
    pub fn policies(&self) -> &Arc<PolicyStore> {
        self.evaluator.store()
    }

    /// Atomically replaces the active policies.
    pub fn reload_policies(&self, policies: PolicySet) {
        self.evaluator.store().reload(policies);
    }
}

impl fmt::Debug for SecurityPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityPipeline")
            .field("validators", &self.validators)
            .field("evaluator", &self.evaluator)
            .field("mapper", &self.mapper)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SecurityPipeline`].
///
/// Defaults: the standard [`CredentialExtractor`], no validators, an empty
/// policy set (everything is denied) and the default realm.
#[derive(Default)]
pub struct SecurityPipelineBuilder {
    extractor: Option<Arc<dyn ExtractCredential>>,
    validators: ValidatorSet,
    policies: Option<Arc<PolicyStore>>,
    mapper: ResponseMapper,
}

impl SecurityPipelineBuilder {
    /// Uses a custom extractor.
    pub fn extractor(mut self, extractor: impl ExtractCredential + 'static) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    /// Registers a validator for `source`.
    pub fn validator(
        mut self,
        source: crate::credential::CredentialSource,
        validator: impl CredentialValidator + 'static,
    ) -> Self {
        self.validators = self.validators.with(source, validator);
        self
    }

    /// Replaces all validators.
    pub fn validators(mut self, validators: ValidatorSet) -> Self {
        self.validators = validators;
        self
    }

    /// Uses `policies` as the initial policy set.
    pub fn policies(mut self, policies: PolicySet) -> Self {
        self.policies = Some(Arc::new(PolicyStore::new(policies)));
        self
    }

    /// Uses a shared policy store, for reloading from elsewhere.
    pub fn policy_store(mut self, store: Arc<PolicyStore>) -> Self {
        self.policies = Some(store);
        self
    }

    /// Sets the realm announced in challenges.
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.mapper = ResponseMapper::new(realm);
        self
    }

    /// Builds the pipeline.
    pub fn build(self) -> SecurityPipeline {
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(CredentialExtractor::default()));
        let store = self.policies.unwrap_or_default();
        SecurityPipeline {
            extractor,
            validators: self.validators,
            evaluator: AuthorizationEvaluator::new(store),
            mapper: self.mapper,
        }
    }
}

impl fmt::Debug for SecurityPipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityPipelineBuilder")
            .field("validators", &self.validators)
            .finish_non_exhaustive()
    }
}
