//! FastUAV optimizer demo binary
//!
//! Minimizes `x0² + x1²` subject to `x0 + x1 ≥ 1` inside `[-5, 5]²`.
//! Settings come from `.env` and `FASTUAV_*` variables; set
//! `FASTUAV_RECORDS` to write every evaluation as JSON lines.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fastuav_cmaes::CmaEs;
use fastuav_common::{Constraint, DesignVariable, NamedValues, Objective, VERSION};
use fastuav_driver::{
    FnModel, JsonLinesRecordSink, ModelOutputs, OptimizationLoop, OptimizationProblem,
    OptimizerConfig, RecordSink, TracingRecordSink,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting FastUAV optimizer v{}", VERSION);

    let mut config = OptimizerConfig::load()?;
    if std::env::var("FASTUAV_SIGMA0").is_err() {
        config.sigma0 = 1.0;
    }
    info!("Loaded configuration: {:?}", config);

    let problem = OptimizationProblem {
        design_variables: vec![DesignVariable::uniform("x", 2, -5.0, 5.0)?],
        initial: [("x".to_string(), vec![2.0, 2.0])].into_iter().collect(),
        objectives: vec![Objective::new("f")],
        constraints: vec![Constraint::lower("sum", 1.0)],
    };

    let model = Arc::new(FnModel(|design: &NamedValues| {
        let x = &design["x"];
        Ok(ModelOutputs::new()
            .objective("f", x[0] * x[0] + x[1] * x[1])
            .constraint("sum", x[0] + x[1]))
    }));

    let sink: Arc<dyn RecordSink> = match std::env::var("FASTUAV_RECORDS") {
        Ok(path) => {
            info!("Recording evaluations to {}", path);
            Arc::new(JsonLinesRecordSink::create(&path).await?)
        }
        Err(_) => Arc::new(TracingRecordSink),
    };

    let report = OptimizationLoop::new(config, problem, model, CmaEs::default)
        .with_record_sink(sink)
        .run()
        .await?;

    info!(
        "Best design x = {:?}, fitness = {:.6}, {} generations, stopped on {:?}",
        report.best["x"], report.fitness, report.generations, report.stop_criteria
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
