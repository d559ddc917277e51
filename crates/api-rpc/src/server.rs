//! JSON-RPC Server
//!
//! Serves JSON-RPC 2.0 over TCP on localhost.

use crate::handler::RpcHandler;
use crate::types::{
    CancelRequest, DocumentRequest, EnrichRequest, JobStatusRequest, LeadStatusRequest,
    LeadUpdateRequest, PendingJobsRequest, QueueStatsRequest, RescheduleReminderRequest, ScheduleEmailRequest,
    ScheduleReminderRequest,
};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9640;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    /// `0` picks a free port
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: RpcHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Start the JSON-RPC server; returns the bound address and the server handle
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("reminder.schedule.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ScheduleReminderRequest = params.parse()?;
                    handler.schedule_reminder(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("reminder.reschedule.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: RescheduleReminderRequest = params.parse()?;
                    handler.reschedule_reminder(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("email.schedule.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ScheduleEmailRequest = params.parse()?;
                    handler.schedule_email(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.cancel.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CancelRequest = params.parse()?;
                    handler.cancel(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("document.enqueue.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: DocumentRequest = params.parse()?;
                    handler.enqueue_document(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("lead.enrich.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: EnrichRequest = params.parse()?;
                    handler.enrich_lead(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("lead.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: LeadStatusRequest = params.parse()?;
                    handler.change_lead_status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("lead.update.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: LeadUpdateRequest = params.parse()?;
                    handler.update_lead(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobStatusRequest = params.parse()?;
                    handler.job_status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("jobs.pending.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: PendingJobsRequest = params.parse()?;
                    handler.pending_jobs(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.stats.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: QueueStatsRequest = params.parse()?;
                    handler.queue_stats(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!(addr = %local_addr, "JSON-RPC server started");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}
