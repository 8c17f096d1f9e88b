use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use tracing_subscriber::EnvFilter;

use flowtrace::config::PipelineConfig;
use flowtrace::flow::{Item, TestSubscriber};
use flowtrace::{
    DebugHook, ExecutionHook, FlowTraceConfig, HookRegistry, Observable, Recorder, StreamError,
    Subscribers, Validator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = FlowTraceConfig::from_env().context("loading FLOWTRACE_CONFIG")?;
    tracing::info!(?config, "Flowtrace starting");

    // Composition root: one recorder, one hook, handed to every pipeline.
    let recorder = Arc::new(Recorder::new());
    let registry = HookRegistry::new();
    registry.install(Arc::new(DebugHook::with_config(recorder.clone(), config.tracer)));

    let scenarios: [fn(Wiring); 4] = [
        single_value,
        expand_and_take,
        error_mid_stream,
        cancelled_before_request,
    ];
    let mut runs = Vec::new();
    for scenario in scenarios {
        let wiring = Wiring {
            hook: registry.current(),
            pipeline: config.pipeline,
        };
        runs.push(tokio::task::spawn_blocking(move || scenario(wiring)));
    }
    for run in runs {
        run.await.context("scenario panicked")?;
    }

    let snapshot = recorder.snapshot();
    println!("{}", snapshot);

    let verdict = Validator::from_config(&config.validator).validate(&snapshot);
    registry.reset();
    match verdict {
        Ok(()) => {
            tracing::info!(streams = snapshot.len(), "Flow-control contract holds");
            Ok(())
        }
        Err(report) => Err(anyhow!(report)),
    }
}

/// Hook plus the pipeline settings each scenario builds with.
struct Wiring {
    hook: Arc<dyn ExecutionHook>,
    pipeline: PipelineConfig,
}

fn source<T: Item>(wiring: &Wiring, observable: Observable<T>) -> Observable<T> {
    observable
        .with_hook(Arc::clone(&wiring.hook))
        .with_config(wiring.pipeline)
}

fn single_value(wiring: Wiring) {
    source(&wiring, Observable::just(1)).subscribe(Subscribers::empty());
}

fn expand_and_take(wiring: Wiring) {
    source(&wiring, Observable::from_iter(vec![1, 3]))
        .flat_map(|it| Observable::from_iter(vec![it * 10, (it + 1) * 10]))
        .take(3)
        .subscribe(Subscribers::empty());
}

fn error_mid_stream(wiring: Wiring) {
    let results = vec![Ok(1), Ok(2), Err(StreamError::msg("upstream failed"))];
    let (subscriber, probe) = TestSubscriber::new(1);
    source(&wiring, Observable::from_results(results)).subscribe(subscriber);
    probe.request(1);
}

fn cancelled_before_request(wiring: Wiring) {
    source(&wiring, Observable::from_iter(vec!["never", "requested"]))
        .subscribe(Subscribers::cancelling());
}
