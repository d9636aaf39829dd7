use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use clap::{Parser, ValueEnum};
use prometheus::{Encoder, TextEncoder};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use reaper_core::app::{ReaperBuilder, ReaperCoordinator, ReaperMetrics};
use reaper_core::domain::ReaperSettings;
use reaper_core::domain::config::{DEFAULT_JOB_LABEL, DEFAULT_LIFETIME_ANNOTATION};
use reaper_kube::KubeCluster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Deletes expired job pods and the services, config maps and secrets they leave behind.
#[derive(Parser, Debug)]
#[command(name = "job-pod-reaper", version, about, long_about = None)]
struct Args {
    /// Label selector for namespaces to scan (empty scans all namespaces)
    #[arg(long, env = "JOB_POD_REAPER_NAMESPACE_LABELS", default_value = "")]
    namespace_labels: String,

    /// Label selector for pods and their dependent resources
    #[arg(long, env = "JOB_POD_REAPER_OBJECT_LABELS", default_value = "")]
    object_labels: String,

    /// Label holding the job id
    #[arg(long, env = "JOB_POD_REAPER_JOB_LABEL", default_value = DEFAULT_JOB_LABEL)]
    job_label: String,

    /// Annotation holding the pod lifetime
    #[arg(
        long,
        env = "JOB_POD_REAPER_LIFETIME_ANNOTATION",
        default_value = DEFAULT_LIFETIME_ANNOTATION
    )]
    lifetime_annotation: String,

    /// Time between reaper passes
    #[arg(
        long,
        env = "JOB_POD_REAPER_REAP_INTERVAL",
        default_value = "60s",
        value_parser = humantime::parse_duration
    )]
    reap_interval: Duration,

    /// Run a single pass and exit
    #[arg(long, env = "JOB_POD_REAPER_RUN_ONCE")]
    run_once: bool,

    /// Address for the /metrics and /healthz endpoints
    #[arg(long, env = "JOB_POD_REAPER_LISTEN_ADDRESS", default_value = "0.0.0.0:8080")]
    listen_address: SocketAddr,

    /// Log filter, e.g. `info` or `reaper_core=debug`
    #[arg(long, env = "JOB_POD_REAPER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "JOB_POD_REAPER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn settings(&self) -> ReaperSettings {
        ReaperSettings {
            namespace_labels: self.namespace_labels.clone(),
            object_labels: self.object_labels.clone(),
            job_label: self.job_label.clone(),
            lifetime_annotation: self.lifetime_annotation.clone(),
        }
    }
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn router(metrics: Arc<ReaperMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/healthz", get(health_check))
        .with_state(metrics)
}

async fn render_metrics(
    State(metrics): State<Arc<ReaperMetrics>>,
) -> Result<Response, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry().gather();

    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).map_err(|e| {
        tracing::error!(error = %e, "failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let body = String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], body).into_response())
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!("received SIGINT"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        tracing::info!("received Ctrl+C");
    }

    Ok(())
}

/// 起動直後に 1 回、その後は interval ごとに pass を実行する
///
/// metrics server が止まったらループも止める。
async fn run_loop(
    coordinator: &ReaperCoordinator,
    interval: Duration,
    mut server: JoinHandle<std::io::Result<()>>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = wait_for_shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // 失敗した pass は次の tick で再試行
                if let Err(error) = coordinator.run_pass().await {
                    tracing::error!(error = %error, "reaper pass failed");
                }
            }
            result = &mut server => {
                match result {
                    Ok(Ok(())) => bail!("metrics server stopped unexpectedly"),
                    Ok(Err(e)) => return Err(e).context("Metrics server failed"),
                    Err(e) => return Err(e).context("Metrics server task panicked"),
                }
            }
            result = &mut shutdown => {
                server.abort();
                result?;
                tracing::info!("reaper stopped");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    let cluster = KubeCluster::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let metrics = Arc::new(ReaperMetrics::new().context("Failed to create metrics registry")?);
    let coordinator = ReaperBuilder::new()
        .settings(args.settings())
        .cluster(Arc::new(cluster))
        .metrics(metrics.clone())
        .build()
        .context("Invalid reaper configuration")?;

    if args.run_once {
        let report = coordinator.run_pass().await.context("Reaper pass failed")?;
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(args.listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen_address))?;
    tracing::info!(address = %args.listen_address, "serving metrics");
    let server = tokio::spawn(async move { axum::serve(listener, router(metrics)).await });

    tracing::info!(interval = ?args.reap_interval, "starting reaper loop");
    run_loop(&coordinator, args.reap_interval, server).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["job-pod-reaper"]).unwrap();

        assert_eq!(args.settings(), ReaperSettings::default());
        assert_eq!(args.reap_interval, Duration::from_secs(60));
        assert!(!args.run_once);
        assert_eq!(args.listen_address, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(args.log_format, LogFormat::Text);
    }

    #[rstest]
    #[case("90s", Duration::from_secs(90))]
    #[case("5m", Duration::from_secs(300))]
    #[case("1h 30m", Duration::from_secs(5400))]
    fn reap_interval_accepts_humantime(#[case] input: &str, #[case] expected: Duration) {
        let args = Args::try_parse_from(["job-pod-reaper", "--reap-interval", input]).unwrap();
        assert_eq!(args.reap_interval, expected);
    }

    #[test]
    fn selectors_are_passed_through() {
        let args = Args::try_parse_from([
            "job-pod-reaper",
            "--namespace-labels",
            "app.kubernetes.io/name=open-ondemand",
            "--object-labels",
            "app.kubernetes.io/managed-by=open-ondemand",
            "--job-label",
            "ood.job",
            "--run-once",
            "--log-format",
            "json",
        ])
        .unwrap();

        let settings = args.settings();
        assert_eq!(settings.namespace_labels, "app.kubernetes.io/name=open-ondemand");
        assert_eq!(settings.object_labels, "app.kubernetes.io/managed-by=open-ondemand");
        assert_eq!(settings.job_label, "ood.job");
        assert!(args.run_once);
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_bad_interval() {
        assert!(Args::try_parse_from(["job-pod-reaper", "--reap-interval", "soon"]).is_err());
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_counters() {
        let metrics = Arc::new(ReaperMetrics::new().unwrap());
        metrics.record_reaped(reaper_core::domain::ResourceKind::Pod);

        let response = render_metrics(State(metrics)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("# TYPE job_pod_reaper_reaped_total counter"));
        assert!(text.contains("job_pod_reaper_reaped_total{type=\"pod\"} 1"));
        assert!(text.contains("job_pod_reaper_reaped_total{type=\"secret\"} 0"));
        assert!(text.contains("job_pod_reaper_error 0"));
    }

    #[tokio::test]
    async fn loop_stops_when_the_metrics_server_fails() {
        let coordinator = ReaperBuilder::new()
            .cluster(Arc::new(reaper_core::impls::InMemoryCluster::new()))
            .build()
            .unwrap();
        let server = tokio::spawn(async { Err(std::io::Error::other("listener closed")) });

        let result = run_loop(&coordinator, Duration::from_secs(3600), server).await;

        let error = result.unwrap_err();
        assert!(format!("{error:#}").contains("listener closed"));
    }

    #[tokio::test]
    async fn health_check_is_ok() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
