use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, ListParams, ObjectList};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::discovery::discover_preferred_resources;
use super::{Instance, ResourceDiscovery, ResourceGroup, ResourceLister};
use crate::error::{ListError, ScanError};
use crate::progress::ProgressHandle;
use crate::scan::gvr::Gvr;

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (doubles each retry)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Page size for paginated list requests
const PAGE_SIZE: u32 = 500;

/// Client for a single cluster context
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
    context: String,
    progress: ProgressHandle,
}

impl K8sClient {
    /// Connect using the given kubeconfig context, or the current one
    pub async fn connect(context: Option<&str>, progress: &ProgressHandle) -> Result<Self, ScanError> {
        let kubeconfig = Kubeconfig::read()
            .map_err(|e| ScanError::connection(context.unwrap_or("<current>"), e))?;

        let context_name = context
            .map(String::from)
            .or_else(|| kubeconfig.current_context.clone())
            .ok_or_else(|| {
                ScanError::connection(
                    "<current>",
                    "No context specified and no current context in kubeconfig",
                )
            })?;

        if !kubeconfig.contexts.iter().any(|c| c.name == context_name) {
            return Err(ScanError::connection(
                &context_name,
                "context not found in kubeconfig",
            ));
        }

        progress.connecting(&context_name);
        let start = std::time::Instant::now();

        let mut config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(context_name.clone()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| ScanError::connection(&context_name, e))?;

        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client =
            Client::try_from(config).map_err(|e| ScanError::connection(&context_name, e))?;

        progress.connected(&context_name, start.elapsed().as_millis() as u64);

        Ok(Self {
            client,
            context: context_name,
            progress: Arc::clone(progress),
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// List resources with pagination and retry logic
    async fn list_all(
        &self,
        api: &Api<DynamicObject>,
        gvr: &Gvr,
    ) -> Result<Vec<DynamicObject>, kube::Error> {
        let mut all_items: Vec<DynamicObject> = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            let mut params = ListParams::default().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                params = params.continue_token(token);
            }

            let list = self.list_page_with_retry(api, &params, gvr).await?;
            let items_count = list.items.len();
            all_items.extend(list.items);
            page_count += 1;

            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    debug!(
                        resource = %gvr.resource,
                        page = page_count,
                        items_this_page = items_count,
                        total_so_far = all_items.len(),
                        "Fetched page, continuing"
                    );
                    continue_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(all_items)
    }

    /// Fetch a single page with retry logic
    async fn list_page_with_retry(
        &self,
        api: &Api<DynamicObject>,
        params: &ListParams,
        gvr: &Gvr,
    ) -> Result<ObjectList<DynamicObject>, kube::Error> {
        let mut attempt = 0;
        loop {
            match api.list(params).await {
                Ok(list) => return Ok(list),
                Err(e) if attempt + 1 < MAX_RETRIES && is_retryable_error(&e) => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(
                        resource = %gvr.resource,
                        context = %self.context,
                        attempt = attempt + 1,
                        max_attempts = MAX_RETRIES,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Retryable error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Check if an error is retryable (transient failures)
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::HyperError(_) => true,
        // Rate limited, unavailable, gateway timeout
        kube::Error::Api(api_err) => matches!(api_err.code, 429 | 503 | 504),
        _ => false,
    }
}

/// Describe a resolved identifier the way dynamic requests expect it
fn api_resource(gvr: &Gvr, kind: &str) -> ApiResource {
    ApiResource {
        group: gvr.group.clone(),
        version: gvr.version.clone(),
        api_version: gvr.api_version(),
        kind: kind.to_string(),
        plural: gvr.resource.clone(),
    }
}

#[async_trait]
impl ResourceDiscovery for K8sClient {
    async fn preferred_resources(&self) -> Result<Vec<ResourceGroup>, ScanError> {
        self.progress.discovering(&self.context);
        let start = std::time::Instant::now();

        let groups = discover_preferred_resources(&self.client).await?;

        let type_count = groups.iter().map(|g| g.resources.len()).sum();
        self.progress
            .discovery_complete(&self.context, type_count, start.elapsed().as_millis() as u64);
        Ok(groups)
    }
}

#[async_trait]
impl ResourceLister for K8sClient {
    async fn list(
        &self,
        gvr: &Gvr,
        kind: &str,
        namespaced: bool,
    ) -> Result<Vec<Instance>, ListError> {
        let ar = api_resource(gvr, kind);
        // Namespaced types are listed across all namespaces
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &ar);

        debug!(
            resource = %gvr.resource,
            api_version = %ar.api_version,
            namespaced,
            "Listing resource type"
        );

        let items = self
            .list_all(&api, gvr)
            .await
            .map_err(|e| ListError::new(gvr.clone(), e))?;
        Ok(items.into_iter().map(Instance::from).collect())
    }
}
