use common::{
    event::{InboundEvent, OutboundResult},
    BoxError, GenericRequest, GenericResponse,
};
use lambda_runtime::{service_fn, LambdaEvent};
use tower::{Service, ServiceExt};
use tracing::{debug, error, info_span, Instrument};

use crate::{request, response, Error};

/// Runs gateway events through an application service.
///
/// The service is called once per event, failures are propagated as is.
#[derive(Debug, Clone)]
pub struct Adapter<S> {
    service: S,
}

impl<S> Adapter<S>
where
    S: Service<GenericRequest, Response = GenericResponse> + Clone,
    S::Error: Into<BoxError>,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<OutboundResult, Error> {
        debug!("Handling {} {}", event.method(), event.raw_path);

        let request = request::build(event)?;
        let response = self
            .service
            .clone()
            .oneshot(request)
            .await
            .map_err(|err| Error::Handler(err.into()))?;

        response::serialize(response).await
    }
}

/// Serves the adapter through the Lambda runtime until the runtime stops.
pub async fn run<S>(adapter: Adapter<S>) -> Result<(), lambda_runtime::Error>
where
    S: Service<GenericRequest, Response = GenericResponse> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    lambda_runtime::run(service_fn(move |event: LambdaEvent<InboundEvent>| {
        let adapter = adapter.clone();
        let span = info_span!("invocation", request_id = %event.context.request_id);
        async move {
            adapter.handle(event.payload).await.map_err(|err| {
                error!("Invocation failed: {err}");
                lambda_runtime::Error::from(err)
            })
        }
        .instrument(span)
    }))
    .await
}
