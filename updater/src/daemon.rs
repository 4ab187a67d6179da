//! Inbound dispatch and the daemon's long-running jobs.
//!
//! Durable messages are routed by subject, admitted against the in-flight
//! registry, and handed to a scheduler job that holds them (with an
//! in-progress heartbeat) until it settles them. Forced restarts and the
//! watchdog run as jobs too, so nothing slow happens on the delivery path.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use updater_common::delays;

use crate::app::AppContext;
use crate::application::ports::{
    ArtifactFetcher, Channel, Delivery, DurableMessage, RestartRequest, ServiceHost,
};
use crate::application::services::companion::{
    ReleasePlan, install_messenger, installed_version, plan_release,
};
use crate::application::services::connection::supervise;
use crate::application::services::inflight::{Admission, AdmissionGuard};
use crate::application::services::messaging::settle_logged;
use crate::application::services::restart::handle_restart;
use crate::application::services::rollback::{rollback_agent, rollback_messenger};
use crate::application::services::update::{record_rejected, run_agent_update};
use crate::application::services::watchdog::tick;
use crate::domain::command::{Schedule, decode_update_command};
use crate::domain::disposition::Disposition;
use crate::domain::layout::ArtifactKind;
use crate::domain::routing::{Route, route};
use crate::scheduler::{JobControl, JobHandle};

pub const WATCHDOG_JOB: &str = "watchdog";
pub const CONNECT_JOB: &str = "connect";
pub const RESTART_JOB: &str = "forced-restart";

/// Intervals of the daemon's periodic work.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub watchdog: Duration,
    pub reconnect: Duration,
    pub progress: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            watchdog: delays::WATCHDOG_INTERVAL,
            reconnect: delays::RECONNECT_INTERVAL,
            progress: delays::PROGRESS_INTERVAL,
        }
    }
}

/// Connect, start the watchdog, and dispatch inbound traffic until
/// `shutdown` resolves or the inbound channel closes. Operations already
/// holding their artifact lane run to completion and settle their message;
/// jobs still waiting are cancelled and their messages stay unacknowledged
/// for redelivery.
pub async fn serve<H, F, C, M, R>(
    ctx: Arc<AppContext<H, F>>,
    channel: Arc<C>,
    inbound: mpsc::Receiver<Delivery<M, R>>,
    timings: Timings,
    shutdown: impl Future<Output = ()>,
) where
    H: ServiceHost,
    F: ArtifactFetcher,
    C: Channel,
    M: DurableMessage,
    R: RestartRequest,
{
    let scheduler = ctx.scheduler.clone();
    scheduler.run_now(CONNECT_JOB, {
        let scheduler = scheduler.clone();
        async move {
            supervise(channel, &scheduler, timings.reconnect).await;
        }
    });
    start_watchdog(&ctx, timings.watchdog);

    tokio::select! {
        () = run_event_loop(Arc::clone(&ctx), inbound, timings.progress) => {
            tracing::warn!("inbound channel closed");
        }
        () = shutdown => tracing::info!("shutdown requested"),
    }
    tracing::info!("waiting for running operations to finish");
    ctx.inflight.close().await;
    scheduler.shutdown();
}

pub async fn run_event_loop<H, F, M, R>(
    ctx: Arc<AppContext<H, F>>,
    mut inbound: mpsc::Receiver<Delivery<M, R>>,
    progress: Duration,
) where
    H: ServiceHost,
    F: ArtifactFetcher,
    M: DurableMessage,
    R: RestartRequest,
{
    while let Some(delivery) = inbound.recv().await {
        match delivery {
            Delivery::Durable(msg) => {
                dispatch(&ctx, msg, progress).await;
            }
            Delivery::Restart(request) => {
                schedule_restart(&ctx, request);
            }
        }
    }
}

/// Route one durable message. Returns the job holding it, if any; messages
/// settled on the spot or ignored return `None`.
pub async fn dispatch<H, F, M>(
    ctx: &Arc<AppContext<H, F>>,
    msg: M,
    progress: Duration,
) -> Option<JobHandle>
where
    H: ServiceHost,
    F: ArtifactFetcher,
    M: DurableMessage,
{
    if let Some(seq) = msg.sequence() {
        if ctx.inflight.holds_sequence(seq) {
            tracing::debug!(seq, subject = msg.subject(), "redelivery of held message ignored");
            return None;
        }
    }
    let Some(route) = route(msg.subject(), &ctx.config.agent_id) else {
        tracing::warn!(subject = msg.subject(), "no handler for subject");
        settle_logged(&msg, Disposition::AckAndTerm).await;
        return None;
    };
    tracing::debug!(subject = msg.subject(), seq = ?msg.sequence(), ?route, "dispatching");
    match route {
        Route::AgentUpdate => accept_agent_update(ctx, msg, progress).await,
        Route::MessengerUpdate => accept_messenger_update(ctx, msg, progress).await,
        Route::AgentRollback => {
            accept_rollback(ctx, msg, ArtifactKind::Agent, progress, |ctx| async move {
                rollback_agent(
                    &ctx.host,
                    ctx.fs.as_ref(),
                    ctx.store.as_ref(),
                    ctx.clock.as_ref(),
                    &ctx.agent,
                )
                .await;
                Disposition::Ack
            })
            .await
        }
        Route::MessengerRollback => {
            accept_rollback(ctx, msg, ArtifactKind::Messenger, progress, |ctx| async move {
                rollback_messenger(&ctx.host, ctx.fs.as_ref(), &ctx.messenger).await;
                Disposition::Ack
            })
            .await
        }
    }
}

async fn accept_agent_update<H, F, M>(
    ctx: &Arc<AppContext<H, F>>,
    msg: M,
    progress: Duration,
) -> Option<JobHandle>
where
    H: ServiceHost,
    F: ArtifactFetcher,
    M: DurableMessage,
{
    let cmd = match decode_update_command(msg.payload()) {
        Ok(cmd) => cmd,
        Err(e) => {
            record_rejected(ctx.store.as_ref(), ctx.clock.as_ref(), &e);
            settle_logged(&msg, Disposition::Nak(delays::NAK_LONG)).await;
            return None;
        }
    };
    let guard = admit(
        ctx,
        &msg,
        ArtifactKind::Agent,
        &cmd.target_version,
        &cmd.download_hash,
    )
    .await?;

    let now = ctx.clock.now_utc();
    let delay = match cmd.schedule(now) {
        Schedule::Now => None,
        Schedule::At(at) => {
            tracing::info!(version = %cmd.target_version, %at, "agent update scheduled");
            Some((at - now).to_std().unwrap_or_default())
        }
    };
    Some(hold(
        ctx,
        msg,
        guard,
        HeldJob {
            name: "agent-update",
            kind: ArtifactKind::Agent,
            delay,
            progress,
        },
        move |ctx| async move { run_agent_update(&ctx.update_deps(), &ctx.agent, &cmd).await },
    ))
}

async fn accept_messenger_update<H, F, M>(
    ctx: &Arc<AppContext<H, F>>,
    msg: M,
    progress: Duration,
) -> Option<JobHandle>
where
    H: ServiceHost,
    F: ArtifactFetcher,
    M: DurableMessage,
{
    let installed = installed_version(ctx.store.as_ref());
    let upgrade = match plan_release(msg.payload(), &ctx.platform, installed.as_deref()) {
        Ok(ReleasePlan::Install(upgrade)) => upgrade,
        Ok(ReleasePlan::UpToDate) => {
            tracing::debug!(installed = ?installed, "messenger is up to date");
            settle_logged(&msg, Disposition::Ack).await;
            return None;
        }
        Err(e) => {
            tracing::error!(error = %e, "rejected messenger release");
            settle_logged(&msg, Disposition::AckAndTerm).await;
            return None;
        }
    };
    let guard = admit(
        ctx,
        &msg,
        ArtifactKind::Messenger,
        &upgrade.version.to_string(),
        &upgrade.sha256,
    )
    .await?;
    Some(hold(
        ctx,
        msg,
        guard,
        HeldJob {
            name: "messenger-update",
            kind: ArtifactKind::Messenger,
            delay: None,
            progress,
        },
        move |ctx| async move {
            install_messenger(
                &ctx.host,
                ctx.fs.as_ref(),
                &ctx.fetcher,
                ctx.store.as_ref(),
                &ctx.messenger,
                &upgrade,
            )
            .await
        },
    ))
}

async fn accept_rollback<H, F, M, B, Fut>(
    ctx: &Arc<AppContext<H, F>>,
    msg: M,
    kind: ArtifactKind,
    progress: Duration,
    body: B,
) -> Option<JobHandle>
where
    H: ServiceHost,
    F: ArtifactFetcher,
    M: DurableMessage,
    B: FnOnce(Arc<AppContext<H, F>>) -> Fut + Send + 'static,
    Fut: Future<Output = Disposition> + Send + 'static,
{
    let guard = admit(ctx, &msg, kind, "rollback", "").await?;
    let name = match kind {
        ArtifactKind::Agent => "agent-rollback",
        ArtifactKind::Messenger => "messenger-rollback",
    };
    Some(hold(
        ctx,
        msg,
        guard,
        HeldJob {
            name,
            kind,
            delay: None,
            progress,
        },
        body,
    ))
}

/// Admit `msg`, settling it here when it duplicates a held message.
async fn admit<H, F, M>(
    ctx: &Arc<AppContext<H, F>>,
    msg: &M,
    kind: ArtifactKind,
    version: &str,
    sha256: &str,
) -> Option<AdmissionGuard>
where
    M: DurableMessage,
{
    match ctx.inflight.admit(kind, msg.sequence(), version, sha256) {
        Admission::Accepted(guard) => Some(guard),
        Admission::Redelivery => None,
        Admission::Duplicate => {
            tracing::info!(
                artifact = kind.label(),
                version,
                "same request already pending, terminating duplicate"
            );
            settle_logged(msg, Disposition::AckAndTerm).await;
            None
        }
    }
}

struct HeldJob {
    name: &'static str,
    kind: ArtifactKind,
    delay: Option<Duration>,
    progress: Duration,
}

/// Schedule `body` and keep `msg` alive with in-progress heartbeats until the
/// disposition it returns has been applied.
fn hold<H, F, M, B, Fut>(
    ctx: &Arc<AppContext<H, F>>,
    msg: M,
    guard: AdmissionGuard,
    job: HeldJob,
    body: B,
) -> JobHandle
where
    H: ServiceHost,
    F: ArtifactFetcher,
    M: DurableMessage,
    B: FnOnce(Arc<AppContext<H, F>>) -> Fut + Send + 'static,
    Fut: Future<Output = Disposition> + Send + 'static,
{
    let msg = Arc::new(msg);
    let heartbeat = ctx.scheduler.run_every(
        &format!("{}-progress", job.name),
        job.progress,
        {
            let msg = Arc::clone(&msg);
            move || {
                let msg = Arc::clone(&msg);
                async move {
                    if let Err(e) = msg.in_progress().await {
                        tracing::warn!(subject = msg.subject(), error = %format!("{e:#}"), "in-progress signal failed");
                    }
                    JobControl::Continue
                }
            }
        },
    );

    let job_ctx = Arc::clone(ctx);
    let (name, kind) = (job.name, job.kind);
    let run = async move {
        let Some(turn) = job_ctx.inflight.enter(kind).await else {
            tracing::info!(job = name, "shutting down, message left for redelivery");
            job_ctx.scheduler.cancel(heartbeat.id);
            return;
        };
        let disposition = body(Arc::clone(&job_ctx)).await;
        job_ctx.scheduler.cancel(heartbeat.id);
        settle_logged(msg.as_ref(), disposition).await;
        drop(turn);
        drop(guard);
    };
    match job.delay {
        Some(delay) => ctx.scheduler.run_after(job.name, delay, run),
        None => ctx.scheduler.run_now(job.name, run),
    }
}

/// Restart the agent from a job, after any operation on it has finished.
pub fn schedule_restart<H, F, R>(ctx: &Arc<AppContext<H, F>>, request: R) -> JobHandle
where
    H: ServiceHost,
    F: ArtifactFetcher,
    R: RestartRequest,
{
    let job_ctx = Arc::clone(ctx);
    ctx.scheduler.run_now(RESTART_JOB, async move {
        let Some(_turn) = job_ctx.inflight.enter(ArtifactKind::Agent).await else {
            tracing::info!("shutting down, forced restart dropped");
            return;
        };
        handle_restart(&job_ctx.host, &job_ctx.config.service_name, request).await;
    })
}

/// Periodic watchdog. A tick is skipped while the agent is being swapped,
/// rolled back or restarted.
pub fn start_watchdog<H, F>(ctx: &Arc<AppContext<H, F>>, period: Duration) -> JobHandle
where
    H: ServiceHost,
    F: ArtifactFetcher,
{
    let job_ctx = Arc::clone(ctx);
    ctx.scheduler.run_every(WATCHDOG_JOB, period, move || {
        let ctx = Arc::clone(&job_ctx);
        async move {
            let Some(_turn) = ctx.inflight.try_enter(ArtifactKind::Agent) else {
                tracing::debug!("agent operation in progress, skipping watchdog tick");
                return JobControl::Continue;
            };
            let outcome = tick(
                &ctx.host,
                ctx.fs.as_ref(),
                ctx.store.as_ref(),
                ctx.clock.as_ref(),
                &ctx.config.service_name,
                ctx.config.agent_log.as_deref(),
            )
            .await;
            tracing::debug!(?outcome, "watchdog tick");
            JobControl::Continue
        }
    })
}
