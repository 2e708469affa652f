use tonic::{Request, Response, Status};

use crate::grpc::proto;
use crate::grpc::proto::metrics_server::Metrics;
use crate::scenarios;
use crate::state::AppState;

pub struct MetricsGrpcService {
    state: AppState,
}

impl MetricsGrpcService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn check_trusted_subnet<T>(&self, req: &Request<T>) -> Result<(), Status> {
        let Some(net) = &self.state.cfg.trusted_subnet else {
            return Ok(());
        };
        let addr = req
            .metadata()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        match addr {
            Some(addr) if net.contains(addr) => Ok(()),
            _ => Err(Status::unauthenticated("request not from a trusted subnet")),
        }
    }
}

#[tonic::async_trait]
impl Metrics for MetricsGrpcService {
    async fn save(
        &self,
        request: Request<proto::SaveMetricRequest>,
    ) -> Result<Response<proto::SaveMetricResponse>, Status> {
        self.check_trusted_subnet(&request)?;
        let m = request
            .into_inner()
            .metric
            .ok_or_else(|| Status::invalid_argument("metric field is required"))?;
        let m = m.try_into().map_err(|e: crate::error::ScenarioError| e.to_grpc_status())?;
        scenarios::save_metric(self.state.repo.as_ref(), &self.state.cfg, m, true)
            .await
            .map_err(|e| e.to_grpc_status())?;
        Ok(Response::new(proto::SaveMetricResponse {}))
    }

    async fn save_list(
        &self,
        request: Request<proto::SaveListMetricsRequest>,
    ) -> Result<Response<proto::SaveListMetricsResponse>, Status> {
        self.check_trusted_subnet(&request)?;
        let ms = request
            .into_inner()
            .metric
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, crate::error::ScenarioError>>()
            .map_err(|e| e.to_grpc_status())?;
        let count = scenarios::save_array_metric(self.state.repo.as_ref(), &self.state.cfg, ms)
            .await
            .map_err(|e| e.to_grpc_status())?;
        Ok(Response::new(proto::SaveListMetricsResponse {
            count: count as i64,
        }))
    }

    async fn get(
        &self,
        request: Request<proto::GetMetricRequest>,
    ) -> Result<Response<proto::GetMetricResponse>, Status> {
        self.check_trusted_subnet(&request)?;
        let inner = request.into_inner();
        let sign = !self.state.cfg.key.is_empty();
        let m = scenarios::get_metric(
            self.state.repo.as_ref(),
            &inner.metric_name,
            &inner.metric_type,
            sign,
            &self.state.cfg.key,
        )
        .await
        .map_err(|e| e.to_grpc_status())?;
        Ok(Response::new(proto::GetMetricResponse {
            metric: Some((&m).into()),
        }))
    }

    async fn get_list(
        &self,
        request: Request<proto::GetListMetricRequest>,
    ) -> Result<Response<proto::GetListMetricResponse>, Status> {
        self.check_trusted_subnet(&request)?;
        let list = self
            .state
            .repo
            .list_metrics()
            .await
            .map_err(|e| e.to_grpc_status())?;
        Ok(Response::new(proto::GetListMetricResponse {
            metric: list.iter().map(Into::into).collect(),
        }))
    }

    async fn ping(
        &self,
        request: Request<proto::PingRequest>,
    ) -> Result<Response<proto::PingResponse>, Status> {
        self.check_trusted_subnet(&request)?;
        self.state
            .repo
            .ping()
            .await
            .map_err(|e| e.to_grpc_status())?;
        Ok(Response::new(proto::PingResponse { ping: true }))
    }
}
